//! Splitting a secret into share envelopes and sealing them

use crate::crypto::PassphraseCipher;
use crate::envelope::ShareEnvelope;
use crate::error::{Result, ShardKeepError};
use crate::primitives::SecretSplitter;
use crate::{DEFAULT_THRESHOLD, DEFAULT_TOTAL, MAX_SHARES};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Threshold scheme parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareConfig {
    /// Shares needed to reconstruct
    pub threshold: u8,
    /// Shares produced
    pub total: u8,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            total: DEFAULT_TOTAL,
        }
    }
}

impl ShareConfig {
    /// Create a new share config
    pub fn new(threshold: u8, total: u8) -> Result<Self> {
        if threshold == 0 {
            return Err(ShardKeepError::InvalidParameters(
                "threshold must be > 0".to_string(),
            ));
        }
        if total < threshold {
            return Err(ShardKeepError::InvalidParameters(format!(
                "total ({}) must be >= threshold ({})",
                total, threshold
            )));
        }
        if total as usize > MAX_SHARES {
            return Err(ShardKeepError::InvalidParameters(format!(
                "total must be <= {}",
                MAX_SHARES
            )));
        }
        Ok(Self { threshold, total })
    }

    /// Shares that can be lost without losing the secret
    pub fn max_losses(&self) -> u8 {
        self.total - self.threshold
    }
}

/// Split `secret` into envelopes numbered `1..=total`
pub fn deal<S: SecretSplitter + ?Sized>(
    splitter: &S,
    secret: &[u8],
    config: ShareConfig,
) -> Result<Vec<ShareEnvelope>> {
    if secret.is_empty() {
        return Err(ShardKeepError::InvalidParameters(
            "secret must not be empty".to_string(),
        ));
    }
    let config = ShareConfig::new(config.threshold, config.total)?;

    let payloads = splitter.split(secret, config.total, config.threshold)?;
    if payloads.len() != config.total as usize {
        return Err(ShardKeepError::Sharing(format!(
            "splitter produced {} payloads, expected {}",
            payloads.len(),
            config.total
        )));
    }

    info!(
        threshold = config.threshold,
        total = config.total,
        "Secret split into shares"
    );

    Ok(payloads
        .into_iter()
        .zip(1..=config.total)
        .map(|(payload, index)| {
            ShareEnvelope::new(index, config.threshold, Some(config.total), payload)
        })
        .collect())
}

/// Encrypted form of a share
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealedContent {
    Armored(String),
    Binary(Vec<u8>),
}

/// A password-sealed share, ready to write out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedShare {
    pub index: u8,
    pub content: SealedContent,
}

impl SealedShare {
    pub fn as_bytes(&self) -> &[u8] {
        match &self.content {
            SealedContent::Armored(text) => text.as_bytes(),
            SealedContent::Binary(bytes) => bytes,
        }
    }

    /// Conventional file name, e.g. `share-2.asc`
    pub fn file_name(&self) -> String {
        let ext = match self.content {
            SealedContent::Armored(_) => "asc",
            SealedContent::Binary(_) => "bin",
        };
        format!("share-{}.{}", self.index, ext)
    }
}

/// Seal every envelope with the same password. Key derivation dominates the
/// cost, so shares are sealed in parallel.
pub fn seal_all(
    cipher: &PassphraseCipher,
    envelopes: &[ShareEnvelope],
    password: &str,
    armored: bool,
) -> Result<Vec<SealedShare>> {
    if password.is_empty() {
        return Err(ShardKeepError::InvalidParameters(
            "password must not be empty".to_string(),
        ));
    }

    envelopes
        .par_iter()
        .map(|envelope| -> Result<SealedShare> {
            let plaintext = envelope.encode();
            let content = if armored {
                SealedContent::Armored(cipher.seal_armored(plaintext.as_bytes(), password)?)
            } else {
                SealedContent::Binary(cipher.seal(plaintext.as_bytes(), password)?)
            };
            Ok(SealedShare {
                index: envelope.index,
                content,
            })
        })
        .collect()
}
