//! Decryption gateway
//!
//! Runs the decrypt primitive on an encrypted blob and sorts its failures
//! into wrong-password, malformed-ciphertext or unknown. Primitives only
//! report text, so the sorting is a heuristic over the error message.

use crate::detect::EncryptedBlob;
use crate::envelope::ShareEnvelope;
use crate::primitives::Decryptor;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Messages that mean the password (or key) was wrong
const WRONG_PASSWORD_PATTERNS: &[&str] = &[
    "authentication failed",
    "incorrect key",
    "wrong password",
    "session key decryption failed",
    "modification detected",
    "incorrect password",
    "bad password",
];

/// Messages that mean the ciphertext itself is damaged or unsupported
const MALFORMED_PATTERNS: &[&str] = &[
    "too short",
    "bad magic",
    "unsupported",
    "malformed",
    "misformed",
    "armor",
    "invalid base64",
    "invalid packet",
    "truncated",
    "corrupt",
];

/// Category of a decryption failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptionErrorKind {
    WrongPassword,
    MalformedCiphertext,
    Unknown,
}

impl fmt::Display for DecryptionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecryptionErrorKind::WrongPassword => write!(f, "wrong password"),
            DecryptionErrorKind::MalformedCiphertext => write!(f, "malformed ciphertext"),
            DecryptionErrorKind::Unknown => write!(f, "decryption failed"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct DecryptionError {
    pub kind: DecryptionErrorKind,
    pub detail: String,
}

impl DecryptionError {
    fn new(kind: DecryptionErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Sort a primitive's error message into a failure category.
/// Wrong-password patterns are checked before malformed ones.
pub fn classify_failure(message: &str) -> DecryptionErrorKind {
    let lower = message.to_lowercase();
    if WRONG_PASSWORD_PATTERNS.iter().any(|p| lower.contains(p)) {
        DecryptionErrorKind::WrongPassword
    } else if MALFORMED_PATTERNS.iter().any(|p| lower.contains(p)) {
        DecryptionErrorKind::MalformedCiphertext
    } else {
        DecryptionErrorKind::Unknown
    }
}

/// Adapter between encrypted blobs and a decrypt primitive
#[derive(Debug, Clone)]
pub struct DecryptionGateway<D> {
    decryptor: D,
}

impl<D: Decryptor> DecryptionGateway<D> {
    pub fn new(decryptor: D) -> Self {
        Self { decryptor }
    }

    /// Decrypt a blob and decode the plaintext as a share envelope
    pub fn attempt_decrypt(
        &self,
        blob: &EncryptedBlob,
        password: &str,
    ) -> Result<ShareEnvelope, DecryptionError> {
        let result = if blob.armored {
            let text = blob.as_text().ok_or_else(|| {
                DecryptionError::new(
                    DecryptionErrorKind::MalformedCiphertext,
                    "armored blob is not valid UTF-8",
                )
            })?;
            self.decryptor.decrypt_armored(text, password)
        } else {
            self.decryptor.decrypt_binary(&blob.raw, password)
        };

        let mut plaintext = result.map_err(|e| {
            let detail = e.to_string();
            let kind = classify_failure(&detail);
            warn!(%kind, armored = blob.armored, "Decryption failed");
            DecryptionError::new(kind, detail)
        })?;

        let decoded = match std::str::from_utf8(&plaintext) {
            Ok(text) => ShareEnvelope::decode(text).map_err(|e| {
                DecryptionError::new(
                    DecryptionErrorKind::MalformedCiphertext,
                    format!("decrypted content is not a share: {}", e),
                )
            }),
            Err(_) => Err(DecryptionError::new(
                DecryptionErrorKind::MalformedCiphertext,
                "decrypted content is not text",
            )),
        };
        plaintext.iter_mut().for_each(|b| *b = 0);

        if let Ok(envelope) = &decoded {
            debug!(index = envelope.index, "Decrypted share");
        }
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{tests::fast_params, CryptoError, PassphraseCipher};

    fn envelope() -> ShareEnvelope {
        ShareEnvelope::new(2, 2, Some(3), vec![0x02, 0x99, 0x98])
    }

    fn gateway() -> DecryptionGateway<PassphraseCipher> {
        DecryptionGateway::new(PassphraseCipher::with_params(fast_params()))
    }

    fn sealed_blob(armored: bool, password: &str) -> EncryptedBlob {
        let cipher = PassphraseCipher::with_params(fast_params());
        let plaintext = envelope().encode();
        let raw = if armored {
            cipher
                .seal_armored(plaintext.as_bytes(), password)
                .unwrap()
                .into_bytes()
        } else {
            cipher.seal(plaintext.as_bytes(), password).unwrap()
        };
        EncryptedBlob { raw, armored }
    }

    #[test]
    fn test_classify_failure_patterns() {
        assert_eq!(
            classify_failure("Session key decryption failed."),
            DecryptionErrorKind::WrongPassword
        );
        assert_eq!(
            classify_failure("Modification Detected"),
            DecryptionErrorKind::WrongPassword
        );
        assert_eq!(
            classify_failure("Misformed armored text"),
            DecryptionErrorKind::MalformedCiphertext
        );
        assert_eq!(
            classify_failure("packet is truncated"),
            DecryptionErrorKind::MalformedCiphertext
        );
        assert_eq!(classify_failure("out of memory"), DecryptionErrorKind::Unknown);
    }

    #[test]
    fn test_wrong_password_checked_first() {
        // Mentions both a wrong-password and a malformed pattern
        assert_eq!(
            classify_failure("incorrect key for armor"),
            DecryptionErrorKind::WrongPassword
        );
    }

    #[test]
    fn test_crypto_errors_classify() {
        assert_eq!(
            classify_failure(&CryptoError::AuthenticationFailed.to_string()),
            DecryptionErrorKind::WrongPassword
        );
        assert_eq!(
            classify_failure(&CryptoError::BadMagic.to_string()),
            DecryptionErrorKind::MalformedCiphertext
        );
        assert_eq!(
            classify_failure(&CryptoError::TooShort { len: 3, min: 58 }.to_string()),
            DecryptionErrorKind::MalformedCiphertext
        );
        assert_eq!(
            classify_failure(&CryptoError::UnsupportedArmor("PGP MESSAGE".into()).to_string()),
            DecryptionErrorKind::MalformedCiphertext
        );
    }

    #[test]
    fn test_decrypt_armored_and_binary() {
        let gw = gateway();
        for armored in [true, false] {
            let blob = sealed_blob(armored, "hunter2");
            assert_eq!(gw.attempt_decrypt(&blob, "hunter2").unwrap(), envelope());
        }
    }

    #[test]
    fn test_wrong_password() {
        let blob = sealed_blob(true, "hunter2");
        let err = gateway().attempt_decrypt(&blob, "hunter3").unwrap_err();
        assert_eq!(err.kind, DecryptionErrorKind::WrongPassword);
    }

    #[test]
    fn test_truncated_ciphertext_is_malformed() {
        let mut blob = sealed_blob(false, "pw");
        blob.raw.truncate(20);
        let err = gateway().attempt_decrypt(&blob, "pw").unwrap_err();
        assert_eq!(err.kind, DecryptionErrorKind::MalformedCiphertext);
    }

    #[test]
    fn test_plaintext_not_an_envelope() {
        let cipher = PassphraseCipher::with_params(fast_params());
        let blob = EncryptedBlob {
            raw: cipher.seal(b"just a note", "pw").unwrap(),
            armored: false,
        };
        let err = gateway().attempt_decrypt(&blob, "pw").unwrap_err();
        assert_eq!(err.kind, DecryptionErrorKind::MalformedCiphertext);
        assert!(err.detail.contains("not a share"));
    }

    #[test]
    fn test_unknown_failure() {
        struct Broken;
        impl Decryptor for Broken {
            type Error = String;
            fn decrypt_armored(&self, _: &str, _: &str) -> Result<Vec<u8>, String> {
                Err("backend unavailable".into())
            }
            fn decrypt_binary(&self, _: &[u8], _: &str) -> Result<Vec<u8>, String> {
                Err("backend unavailable".into())
            }
        }

        let blob = EncryptedBlob {
            raw: b"-----BEGIN PGP MESSAGE-----".to_vec(),
            armored: true,
        };
        let err = DecryptionGateway::new(Broken)
            .attempt_decrypt(&blob, "pw")
            .unwrap_err();
        assert_eq!(err.kind, DecryptionErrorKind::Unknown);
        assert_eq!(err.detail, "backend unavailable");
    }
}
