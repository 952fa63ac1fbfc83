//! ShardKeep Core Library
//!
//! Threshold secret sharing with password-sealed shares.
//! This crate provides:
//! - Share envelopes: the self-describing text form of one share
//! - Format detection for pasted lines and uploaded files
//! - Collection validation (threshold, duplicates, malformed inputs)
//! - A recovery session state machine from raw inputs to the secret
//! - Default primitives: GF(256) Shamir sharing, Argon2id + AES-GCM sealing

pub mod crypto;
pub mod dealer;
pub mod detect;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod intake;
pub mod primitives;
pub mod session;
pub mod shamir;
pub mod validate;

pub use crypto::{CryptoError, KdfParams, PassphraseCipher};
pub use dealer::{deal, seal_all, SealedContent, SealedShare, ShareConfig};
pub use detect::{classify, classify_all, ClassifiedInput, EncryptedBlob, Unrecognized};
pub use envelope::{DecodeError, ShareEnvelope};
pub use error::{RecoveryFailure, Result, SessionError, ShardKeepError};
pub use gateway::{DecryptionError, DecryptionErrorKind, DecryptionGateway};
pub use intake::{paste_units, Channel, Origin, RawContent, RawInput};
pub use primitives::{
    combine_with_fallback, CombineError, Decryptor, SecretCombiner, SecretSplitter,
};
pub use session::{
    drive, PasswordResponse, PasswordSource, Phase, RecoveredSecret, RecoveryPolicy,
    RecoverySession, SessionStatus,
};
pub use shamir::Gf256Shamir;
pub use validate::{validate, validate_collected, Rejection, ValidationIssue, ValidationReport};

/// Share numbering uses a single byte, and x = 0 is reserved for the secret
pub const MAX_SHARES: usize = 255;

/// Default scheme: any 3 of 5 shares recover the secret.
///
/// Override at runtime via SHARDKEEP_THRESHOLD / SHARDKEEP_TOTAL env vars.
pub const DEFAULT_THRESHOLD: u8 = 3;
pub const DEFAULT_TOTAL: u8 = 5;

/// Read the share scheme from environment, falling back to compile-time defaults.
/// Returns (threshold, total).
pub fn share_config_from_env() -> (u8, u8) {
    let threshold = std::env::var("SHARDKEEP_THRESHOLD")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .unwrap_or(DEFAULT_THRESHOLD);
    let total = std::env::var("SHARDKEEP_TOTAL")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .unwrap_or(DEFAULT_TOTAL);
    (threshold, total)
}
