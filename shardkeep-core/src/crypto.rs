//! Passphrase sealing for shares
//!
//! Provides:
//! - Argon2id key derivation from a password
//! - AES-256-GCM encryption (authenticated encryption)
//! - The sealed share format and its text armor
//!
//! Sealed format:
//! ```text
//! magic "SHKP"[4] || version[1] || m_cost[4] || t_cost[4] || p_cost[1]
//!   || salt[16] || nonce[12] || ciphertext || tag[16]
//! ```
//! KDF costs are stored big-endian so a share sealed with any cost can be
//! opened without out-of-band configuration.

use crate::primitives::Decryptor;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// AES-256-GCM key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size (12 bytes / 96 bits)
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Argon2 salt size
pub const SALT_SIZE: usize = 16;

/// Leading bytes of a sealed share
pub const SEALED_MAGIC: &[u8; 4] = b"SHKP";

/// Current sealed format version
pub const SEALED_VERSION: u8 = 0x01;

/// magic + version + m_cost + t_cost + p_cost
pub const HEADER_SIZE: usize = 4 + 1 + 4 + 4 + 1; // 14

/// Smallest well-formed sealed share (empty plaintext)
pub const MIN_SEALED_SIZE: usize = HEADER_SIZE + SALT_SIZE + NONCE_SIZE + TAG_SIZE; // 58

pub const ARMOR_BEGIN: &str = "-----BEGIN SHARDKEEP MESSAGE-----";
pub const ARMOR_END: &str = "-----END SHARDKEEP MESSAGE-----";
const ARMOR_LINE_WIDTH: usize = 64;

/// Upper bounds accepted when opening, so a hostile header cannot demand
/// unbounded memory or time
const MAX_MEMORY_KIB: u32 = 1 << 18; // 256 MiB
const MAX_ITERATIONS: u32 = 64;
const MAX_PARALLELISM: u8 = 16;

/// Errors from sealing and opening shares
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Ciphertext too short: {len} bytes (min: {min})")]
    TooShort { len: usize, min: usize },

    #[error("Bad magic: not a sealed share")]
    BadMagic,

    #[error("Unsupported sealed format version {0}")]
    UnsupportedVersion(u8),

    #[error("Unsupported armor header: {0}")]
    UnsupportedArmor(String),

    #[error("Invalid armor: {0}")]
    Armor(String),

    #[error("Unsupported KDF parameters: {0}")]
    KdfParams(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Authentication failed: wrong password or corrupted data")]
    AuthenticationFailed,
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u8,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST as u8,
        }
    }
}

impl KdfParams {
    fn validate(&self) -> Result<(), CryptoError> {
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(CryptoError::KdfParams(format!(
                "parallelism {} outside 1..={}",
                self.parallelism, MAX_PARALLELISM
            )));
        }
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(CryptoError::KdfParams(format!(
                "iterations {} outside 1..={}",
                self.iterations, MAX_ITERATIONS
            )));
        }
        let min_memory = 8 * self.parallelism as u32;
        if self.memory_kib < min_memory || self.memory_kib > MAX_MEMORY_KIB {
            return Err(CryptoError::KdfParams(format!(
                "memory {} KiB outside {}..={}",
                self.memory_kib, min_memory, MAX_MEMORY_KIB
            )));
        }
        Ok(())
    }
}

/// AES-256-GCM key
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derive key from password using Argon2id
    pub fn derive_from_password(
        password: &[u8],
        salt: &[u8],
        params: &KdfParams,
    ) -> Result<Self, CryptoError> {
        params.validate()?;
        let argon2_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism as u32,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::KdfParams(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);
        let mut key = [0u8; KEY_SIZE];
        argon2
            .hash_password_into(password, salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        Ok(Self(key))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

/// Encrypted data container
#[derive(Debug, Clone)]
pub struct EncryptedData {
    /// Nonce used for encryption (unique per encryption)
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize to bytes (nonce prepended to ciphertext)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Deserialize from bytes (nonce prepended to ciphertext)
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::TooShort {
                len: data.len(),
                min: NONCE_SIZE + TAG_SIZE,
            });
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&data[..NONCE_SIZE]);

        Ok(Self {
            nonce,
            ciphertext: data[NONCE_SIZE..].to_vec(),
        })
    }
}

/// Encrypt data using AES-256-GCM
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<EncryptedData, CryptoError> {
    use rand::RngCore;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt data using AES-256-GCM
pub fn decrypt(encrypted: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    let nonce = Nonce::from_slice(&encrypted.nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(nonce, encrypted.ciphertext.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Password-based sealing of share text
#[derive(Debug, Clone, Default)]
pub struct PassphraseCipher {
    params: KdfParams,
}

impl PassphraseCipher {
    /// Cipher sealing with the default Argon2id costs
    pub fn new() -> Self {
        Self::default()
    }

    /// Cipher sealing with custom Argon2id costs. Opening always uses the
    /// costs stored in the sealed header.
    pub fn with_params(params: KdfParams) -> Self {
        Self { params }
    }

    /// Seal plaintext into the binary sealed format
    pub fn seal(&self, plaintext: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
        use rand::RngCore;

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        let key = EncryptionKey::derive_from_password(password.as_bytes(), &salt, &self.params)?;
        let encrypted = encrypt(plaintext, &key)?;

        let body = encrypted.to_bytes();
        let mut out = Vec::with_capacity(HEADER_SIZE + SALT_SIZE + body.len());
        out.extend_from_slice(SEALED_MAGIC);
        out.push(SEALED_VERSION);
        out.extend_from_slice(&self.params.memory_kib.to_be_bytes());
        out.extend_from_slice(&self.params.iterations.to_be_bytes());
        out.push(self.params.parallelism);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Open a binary sealed share
    pub fn open(&self, sealed: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
        let header = parse_header(sealed)?;
        let key = EncryptionKey::derive_from_password(
            password.as_bytes(),
            header.salt,
            &header.params,
        )?;
        let encrypted = EncryptedData::from_bytes(header.body)?;
        decrypt(&encrypted, &key)
    }

    /// Seal plaintext and wrap it in text armor
    pub fn seal_armored(&self, plaintext: &[u8], password: &str) -> Result<String, CryptoError> {
        Ok(armor(&self.seal(plaintext, password)?))
    }

    /// Open an armored sealed share
    pub fn open_armored(&self, armored: &str, password: &str) -> Result<Vec<u8>, CryptoError> {
        self.open(&dearmor(armored)?, password)
    }
}

impl Decryptor for PassphraseCipher {
    type Error = CryptoError;

    fn decrypt_armored(&self, armored: &str, password: &str) -> Result<Vec<u8>, CryptoError> {
        self.open_armored(armored, password)
    }

    fn decrypt_binary(&self, ciphertext: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
        self.open(ciphertext, password)
    }
}

struct SealedHeader<'a> {
    params: KdfParams,
    salt: &'a [u8],
    body: &'a [u8],
}

fn parse_header(data: &[u8]) -> Result<SealedHeader<'_>, CryptoError> {
    if data.len() < SEALED_MAGIC.len() + 1 {
        return Err(CryptoError::TooShort {
            len: data.len(),
            min: MIN_SEALED_SIZE,
        });
    }
    if &data[..4] != SEALED_MAGIC {
        return Err(CryptoError::BadMagic);
    }
    if data[4] != SEALED_VERSION {
        return Err(CryptoError::UnsupportedVersion(data[4]));
    }
    if data.len() < MIN_SEALED_SIZE {
        return Err(CryptoError::TooShort {
            len: data.len(),
            min: MIN_SEALED_SIZE,
        });
    }

    let params = KdfParams {
        memory_kib: u32::from_be_bytes([data[5], data[6], data[7], data[8]]),
        iterations: u32::from_be_bytes([data[9], data[10], data[11], data[12]]),
        parallelism: data[13],
    };

    Ok(SealedHeader {
        params,
        salt: &data[HEADER_SIZE..HEADER_SIZE + SALT_SIZE],
        body: &data[HEADER_SIZE + SALT_SIZE..],
    })
}

/// Wrap sealed bytes in text armor
pub fn armor(sealed: &[u8]) -> String {
    let body = STANDARD.encode(sealed);
    let mut out = String::with_capacity(body.len() + body.len() / ARMOR_LINE_WIDTH + 80);
    out.push_str(ARMOR_BEGIN);
    out.push('\n');
    for line in body.as_bytes().chunks(ARMOR_LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(ARMOR_END);
    out.push('\n');
    out
}

/// Strip text armor, returning the sealed bytes
pub fn dearmor(text: &str) -> Result<Vec<u8>, CryptoError> {
    let mut lines = text.trim().lines().map(str::trim);

    let first = lines.next().unwrap_or_default();
    if first != ARMOR_BEGIN {
        if first.starts_with("-----BEGIN ") {
            return Err(CryptoError::UnsupportedArmor(first.to_string()));
        }
        return Err(CryptoError::Armor("missing header line".to_string()));
    }

    let mut body = String::new();
    let mut closed = false;
    for line in lines {
        if line == ARMOR_END {
            closed = true;
            break;
        }
        // Skip blank separators and "Key: Value" armor headers
        if line.is_empty() || line.contains(": ") {
            continue;
        }
        body.push_str(line);
    }

    if !closed {
        return Err(CryptoError::Armor("missing end marker".to_string()));
    }

    STANDARD
        .decode(body)
        .map_err(|e| CryptoError::Armor(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Cheap Argon2 costs so tests stay fast
    pub(crate) fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_encryption_roundtrip() {
        let key = EncryptionKey::from_bytes([7u8; KEY_SIZE]);
        let plaintext = b"secret message";

        let encrypted = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&encrypted, &key).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
        assert_eq!(encrypted.ciphertext.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = EncryptionKey::from_bytes([1u8; KEY_SIZE]);
        let key2 = EncryptionKey::from_bytes([2u8; KEY_SIZE]);

        let encrypted = encrypt(b"secret", &key1).unwrap();
        assert_eq!(
            decrypt(&encrypted, &key2),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_key_debug_is_redacted() {
        assert_eq!(
            format!("{:?}", EncryptionKey::from_bytes([9; 32])),
            "EncryptionKey([REDACTED])"
        );
    }

    #[test]
    fn test_derive_is_deterministic() {
        let salt = [5u8; SALT_SIZE];
        let a = EncryptionKey::derive_from_password(b"pw", &salt, &fast_params()).unwrap();
        let b = EncryptionKey::derive_from_password(b"pw", &salt, &fast_params()).unwrap();
        let c = EncryptionKey::derive_from_password(b"other", &salt, &fast_params()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = PassphraseCipher::with_params(fast_params());
        let sealed = cipher.seal(b"share text", "hunter2").unwrap();

        assert!(sealed.starts_with(SEALED_MAGIC));
        assert_eq!(sealed[4], SEALED_VERSION);
        assert_eq!(cipher.open(&sealed, "hunter2").unwrap(), b"share text");
    }

    #[test]
    fn test_open_uses_header_params() {
        let sealed = PassphraseCipher::with_params(fast_params())
            .seal(b"data", "pw")
            .unwrap();
        // A cipher configured with different costs still opens it
        let other = PassphraseCipher::with_params(KdfParams {
            memory_kib: 128,
            iterations: 2,
            parallelism: 1,
        });
        assert_eq!(other.open(&sealed, "pw").unwrap(), b"data");
    }

    #[test]
    fn test_wrong_password_fails_authentication() {
        let cipher = PassphraseCipher::with_params(fast_params());
        let sealed = cipher.seal(b"share text", "right").unwrap();
        assert_eq!(
            cipher.open(&sealed, "wrong"),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = PassphraseCipher::with_params(fast_params());
        let mut sealed = cipher.seal(b"share text", "pw").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert_eq!(
            cipher.open(&sealed, "pw"),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_malformed_headers() {
        let cipher = PassphraseCipher::with_params(fast_params());
        assert!(matches!(cipher.open(b"SH", "pw"), Err(CryptoError::TooShort { .. })));
        assert_eq!(
            cipher.open(&[0u8; MIN_SEALED_SIZE], "pw"),
            Err(CryptoError::BadMagic)
        );

        let mut sealed = cipher.seal(b"x", "pw").unwrap();
        sealed[4] = 9;
        assert_eq!(
            cipher.open(&sealed, "pw"),
            Err(CryptoError::UnsupportedVersion(9))
        );

        let sealed = cipher.seal(b"x", "pw").unwrap();
        assert!(matches!(
            cipher.open(&sealed[..MIN_SEALED_SIZE - 1], "pw"),
            Err(CryptoError::TooShort { .. })
        ));
    }

    #[test]
    fn test_hostile_kdf_params_rejected() {
        let cipher = PassphraseCipher::with_params(fast_params());
        let mut sealed = cipher.seal(b"x", "pw").unwrap();
        sealed[5..9].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            cipher.open(&sealed, "pw"),
            Err(CryptoError::KdfParams(_))
        ));

        // 512 MiB is past the memory ceiling
        sealed[5..9].copy_from_slice(&(1u32 << 19).to_be_bytes());
        assert!(matches!(
            cipher.open(&sealed, "pw"),
            Err(CryptoError::KdfParams(_))
        ));
    }

    #[test]
    fn test_memory_ceiling() {
        let at_ceiling = KdfParams {
            memory_kib: MAX_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        };
        assert!(at_ceiling.validate().is_ok());
        assert!(KdfParams::default().validate().is_ok());

        let over = KdfParams {
            memory_kib: MAX_MEMORY_KIB + 1,
            ..at_ceiling
        };
        assert!(matches!(over.validate(), Err(CryptoError::KdfParams(_))));
        assert_eq!(MAX_MEMORY_KIB, 256 * 1024);
    }

    #[test]
    fn test_armor_roundtrip() {
        let cipher = PassphraseCipher::with_params(fast_params());
        let armored = cipher.seal_armored(b"share text", "pw").unwrap();

        assert!(armored.starts_with(ARMOR_BEGIN));
        assert!(armored.trim_end().ends_with(ARMOR_END));
        assert!(armored.lines().all(|l| l.len() <= ARMOR_LINE_WIDTH || l.starts_with("-----")));
        assert_eq!(cipher.open_armored(&armored, "pw").unwrap(), b"share text");
    }

    #[test]
    fn test_dearmor_tolerates_headers_and_blank_lines() {
        let sealed = vec![1u8, 2, 3, 4, 5];
        let armored = armor(&sealed);
        let with_headers = armored.replacen('\n', "\nComment: written by hand\n\n", 1);
        assert_eq!(dearmor(&with_headers).unwrap(), sealed);
    }

    #[test]
    fn test_dearmor_errors() {
        assert!(matches!(
            dearmor("-----BEGIN PGP MESSAGE-----\nabc\n-----END PGP MESSAGE-----"),
            Err(CryptoError::UnsupportedArmor(_))
        ));
        assert!(matches!(
            dearmor(&format!("{}\nAAAA\n", ARMOR_BEGIN)),
            Err(CryptoError::Armor(_))
        ));
        assert!(matches!(dearmor("plain text"), Err(CryptoError::Armor(_))));
    }
}
