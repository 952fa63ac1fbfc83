//! Error types for ShardKeep
//!
//! Three layers of errors live here:
//! - [`ShardKeepError`]: unified error for library operations (dealing,
//!   sealing, driving a session)
//! - [`RecoveryFailure`]: the reason a recovery attempt ended in `Failed`.
//!   These are values reported to the caller, never panics.
//! - [`SessionError`]: misuse of the session API (wrong phase, wrong channel)

use crate::intake::Channel;
use crate::session::Phase;
use thiserror::Error;

/// Result type alias for ShardKeep operations
pub type Result<T> = std::result::Result<T, ShardKeepError>;

/// Unified error type for ShardKeep
#[derive(Error, Debug)]
pub enum ShardKeepError {
    // ===== Sharing Errors =====
    #[error("Invalid share parameters: {0}")]
    InvalidParameters(String),

    #[error("Secret sharing error: {0}")]
    Sharing(String),

    // ===== Cryptography Errors =====
    #[error("Encryption error: {0}")]
    Encryption(String),

    // ===== Session Errors =====
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::crypto::CryptoError> for ShardKeepError {
    fn from(err: crate::crypto::CryptoError) -> Self {
        ShardKeepError::Encryption(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ShardKeepError {
    fn from(err: tokio::task::JoinError) -> Self {
        ShardKeepError::Internal(err.to_string())
    }
}

/// Why a recovery attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryFailure {
    #[error("No valid shares were provided")]
    NoValidShares,

    #[error("Insufficient shares: have {have}, need {need}")]
    InsufficientShares { have: usize, need: usize },

    #[error("Duplicate shares for index {indices:?}")]
    DuplicateShares { indices: Vec<u8> },

    #[error("Invalid share format in {origins:?}")]
    InvalidFormat { origins: Vec<String> },

    #[error("A password is required to decrypt the encrypted shares")]
    PasswordRequired,

    #[error("Wrong password")]
    WrongPassword,

    #[error("Encrypted share is malformed: {0}")]
    MalformedCiphertext(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Failed to combine shares: {0}")]
    CombineFailed(String),
}

impl RecoveryFailure {
    /// What the user can do about it
    pub fn hint(&self) -> String {
        match self {
            RecoveryFailure::NoValidShares => {
                "Paste or upload at least one share to start recovery".to_string()
            }
            RecoveryFailure::InsufficientShares { have, need } => {
                let missing = need.saturating_sub(*have);
                format!(
                    "Need {} more share{} ({} of {} provided)",
                    missing,
                    if missing == 1 { "" } else { "s" },
                    have,
                    need
                )
            }
            RecoveryFailure::DuplicateShares { indices } => format!(
                "The same share was provided more than once (index {}); add different shares",
                join_indices(indices)
            ),
            RecoveryFailure::InvalidFormat { origins } => format!(
                "Not a recognized share: {}; remove or replace these inputs",
                origins.join(", ")
            ),
            RecoveryFailure::PasswordRequired => {
                "Some shares are encrypted; enter the password used when they were created"
                    .to_string()
            }
            RecoveryFailure::WrongPassword => {
                "The password did not decrypt the shares; check it and try again".to_string()
            }
            RecoveryFailure::MalformedCiphertext(_) => {
                "An encrypted share is damaged or truncated; use another copy".to_string()
            }
            RecoveryFailure::DecryptionFailed(_) => {
                "An encrypted share could not be decrypted".to_string()
            }
            RecoveryFailure::CombineFailed(_) => {
                "The shares do not belong to the same secret".to_string()
            }
        }
    }
}

fn join_indices(indices: &[u8]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Misuse of the recovery session API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session already finished; start a new session")]
    Finished,

    #[error("Cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: Phase,
    },

    #[error("Input from {origin} does not belong to the {channel} channel")]
    ChannelMismatch { origin: String, channel: Channel },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecoveryFailure::InsufficientShares { have: 2, need: 3 };
        assert_eq!(err.to_string(), "Insufficient shares: have 2, need 3");
        assert_eq!(err.hint(), "Need 1 more share (2 of 3 provided)");

        let err = RecoveryFailure::InsufficientShares { have: 1, need: 4 };
        assert_eq!(err.hint(), "Need 3 more shares (1 of 4 provided)");
    }

    #[test]
    fn test_hints_are_distinct() {
        let wrong = RecoveryFailure::WrongPassword.hint();
        let missing = RecoveryFailure::InsufficientShares { have: 1, need: 2 }.hint();
        assert_ne!(wrong, missing);
        assert!(RecoveryFailure::DuplicateShares { indices: vec![1, 4] }
            .hint()
            .contains("1, 4"));
    }

    #[test]
    fn test_error_from_crypto() {
        let err: ShardKeepError = crate::crypto::CryptoError::AuthenticationFailed.into();
        assert!(matches!(err, ShardKeepError::Encryption(_)));
        assert!(err.to_string().starts_with("Encryption error: "));
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::ChannelMismatch {
            origin: "line 2".to_string(),
            channel: Channel::Upload,
        };
        assert_eq!(
            err.to_string(),
            "Input from line 2 does not belong to the upload channel"
        );
    }
}
