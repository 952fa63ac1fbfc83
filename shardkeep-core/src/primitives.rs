//! External primitive interfaces
//!
//! The recovery engine never depends on a concrete sharing or encryption
//! scheme. It consumes them through these traits; [`crate::shamir`] and
//! [`crate::crypto`] provide the default implementations.

use crate::envelope::ShareEnvelope;
use crate::error::Result;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors reported by a combine primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CombineError {
    /// The primitive does not accept payloads in this form
    #[error("Payload type not accepted: {0}")]
    TypeMismatch(String),

    #[error("{0}")]
    Failed(String),
}

/// Splits a secret into share payloads
pub trait SecretSplitter {
    /// Produce `total` payloads, any `threshold` of which reconstruct `secret`
    fn split(&self, secret: &[u8], total: u8, threshold: u8) -> Result<Vec<Vec<u8>>>;
}

/// Reconstructs a secret from exactly `threshold` payloads
///
/// Deployments differ in which payload form they accept, so both entry
/// points exist. A string-form call that returns
/// [`CombineError::TypeMismatch`] is retried in byte form by
/// [`combine_with_fallback`].
pub trait SecretCombiner {
    /// Combine payloads given in their string form (lowercase hex)
    fn combine_str(&self, payloads: &[String]) -> std::result::Result<Vec<u8>, CombineError>;

    /// Combine raw payload bytes
    fn combine_bytes(&self, payloads: &[Vec<u8>]) -> std::result::Result<Vec<u8>, CombineError>;
}

/// Password-based decryption
///
/// Failures are reported as text; the decryption gateway classifies them.
pub trait Decryptor {
    type Error: fmt::Display;

    /// Decrypt armored (text) ciphertext
    fn decrypt_armored(
        &self,
        armored: &str,
        password: &str,
    ) -> std::result::Result<Vec<u8>, Self::Error>;

    /// Decrypt binary ciphertext
    fn decrypt_binary(
        &self,
        ciphertext: &[u8],
        password: &str,
    ) -> std::result::Result<Vec<u8>, Self::Error>;
}

impl<T: SecretCombiner + ?Sized> SecretCombiner for &T {
    fn combine_str(&self, payloads: &[String]) -> std::result::Result<Vec<u8>, CombineError> {
        (**self).combine_str(payloads)
    }

    fn combine_bytes(&self, payloads: &[Vec<u8>]) -> std::result::Result<Vec<u8>, CombineError> {
        (**self).combine_bytes(payloads)
    }
}

impl<T: Decryptor + ?Sized> Decryptor for &T {
    type Error = T::Error;

    fn decrypt_armored(
        &self,
        armored: &str,
        password: &str,
    ) -> std::result::Result<Vec<u8>, Self::Error> {
        (**self).decrypt_armored(armored, password)
    }

    fn decrypt_binary(
        &self,
        ciphertext: &[u8],
        password: &str,
    ) -> std::result::Result<Vec<u8>, Self::Error> {
        (**self).decrypt_binary(ciphertext, password)
    }
}

/// Combine envelopes, trying the string form first and the byte form when
/// the primitive rejects strings with a type mismatch
pub fn combine_with_fallback<C: SecretCombiner + ?Sized>(
    combiner: &C,
    envelopes: &[&ShareEnvelope],
) -> std::result::Result<Vec<u8>, CombineError> {
    let as_strings: Vec<String> = envelopes.iter().map(|e| e.payload_hex()).collect();

    match combiner.combine_str(&as_strings) {
        Err(CombineError::TypeMismatch(reason)) => {
            debug!(%reason, "String-form combine rejected, retrying with bytes");
            let as_bytes: Vec<Vec<u8>> = envelopes.iter().map(|e| e.payload.clone()).collect();
            combiner.combine_bytes(&as_bytes)
        }
        other => other,
    }
}
