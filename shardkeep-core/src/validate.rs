//! Share collection validation
//!
//! Rules:
//! - The set's threshold comes from the first share. When the first share
//!   carries no threshold (`0`, legacy data only), the most frequent
//!   recorded threshold is used, ties going to the smaller value.
//! - Shares whose threshold disagrees with the set's are reported and left
//!   out of the count.
//! - Only the first share per index counts. Repeats with the same payload
//!   are harmless; repeats with a different payload invalidate the set.
//! - The set is valid when enough distinct shares remain, no conflicting
//!   repeats exist and no input was rejected as malformed.

use crate::envelope::ShareEnvelope;
use crate::error::RecoveryFailure;
use crate::intake::Origin;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// How the set's threshold was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    FirstShare,
    Majority,
    Unknown,
}

/// One problem found in a share collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    NoValidShares,
    InsufficientShares { have: usize, need: usize },
    DuplicateIndex { index: u8, conflicting: bool },
    ThresholdMismatch { index: u8, expected: u8, found: u8 },
    UnknownThreshold,
    InvalidFormat { origin: String, reason: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::NoValidShares => write!(f, "no valid shares"),
            ValidationIssue::InsufficientShares { have, need } => {
                write!(f, "insufficient shares: have {}, need {}", have, need)
            }
            ValidationIssue::DuplicateIndex { index, conflicting } => {
                if *conflicting {
                    write!(f, "share {} appears more than once with different content", index)
                } else {
                    write!(f, "share {} appears more than once", index)
                }
            }
            ValidationIssue::ThresholdMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "share {} requires {} shares, the set requires {}",
                index, found, expected
            ),
            ValidationIssue::UnknownThreshold => write!(f, "no share records a threshold"),
            ValidationIssue::InvalidFormat { origin, reason } => {
                write!(f, "{}: {}", origin, reason)
            }
        }
    }
}

/// An input dropped before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub origin: Origin,
    pub reason: String,
}

impl Rejection {
    pub fn new(origin: Origin, reason: impl Into<String>) -> Self {
        Self {
            origin,
            reason: reason.into(),
        }
    }
}

/// Outcome of validating a share collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    /// Distinct shares agreeing with the set's threshold
    pub valid_count: usize,
    /// `0` when no share records a threshold
    pub threshold: u8,
    pub threshold_source: ThresholdSource,
    pub duplicate_indices: Vec<u8>,
    pub accepted_indices: Vec<u8>,
    pub errors: Vec<ValidationIssue>,
    #[serde(skip)]
    failure: Option<RecoveryFailure>,
}

impl ValidationReport {
    /// The failure a recovery attempt reports for this set, if invalid
    pub fn failure(&self) -> Option<&RecoveryFailure> {
        self.failure.as_ref()
    }

    /// Distinct shares still needed to reach the threshold
    pub fn missing(&self) -> usize {
        (self.threshold as usize).saturating_sub(self.valid_count)
    }
}

fn resolve_threshold(shares: &[ShareEnvelope]) -> (u8, ThresholdSource) {
    match shares.first() {
        None => (0, ThresholdSource::Unknown),
        Some(first) if first.threshold != 0 => (first.threshold, ThresholdSource::FirstShare),
        Some(_) => {
            let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
            for share in shares.iter().filter(|s| s.threshold != 0) {
                *counts.entry(share.threshold).or_default() += 1;
            }
            counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(threshold, _)| (threshold, ThresholdSource::Majority))
                .unwrap_or((0, ThresholdSource::Unknown))
        }
    }
}

fn agrees(share: &ShareEnvelope, threshold: u8) -> bool {
    share.threshold == 0 || share.threshold == threshold
}

/// Validate a set of decoded shares
pub fn validate(shares: &[ShareEnvelope]) -> ValidationReport {
    validate_collected(shares, &[])
}

/// Validate decoded shares together with inputs rejected at intake
pub fn validate_collected(shares: &[ShareEnvelope], rejections: &[Rejection]) -> ValidationReport {
    let (threshold, threshold_source) = resolve_threshold(shares);
    let mut errors = Vec::new();

    let mut first_by_index: BTreeMap<u8, &ShareEnvelope> = BTreeMap::new();
    let mut duplicates: BTreeMap<u8, bool> = BTreeMap::new();
    let mut agreeing = 0usize;

    for share in shares {
        if threshold != 0 && !agrees(share, threshold) {
            errors.push(ValidationIssue::ThresholdMismatch {
                index: share.index,
                expected: threshold,
                found: share.threshold,
            });
            continue;
        }
        agreeing += 1;

        match first_by_index.entry(share.index) {
            Entry::Vacant(slot) => {
                slot.insert(share);
            }
            Entry::Occupied(first) => {
                let conflicting = first.get().payload != share.payload;
                *duplicates.entry(share.index).or_default() |= conflicting;
            }
        }
    }

    for (&index, &conflicting) in &duplicates {
        errors.push(ValidationIssue::DuplicateIndex { index, conflicting });
    }
    if threshold == 0 && !shares.is_empty() {
        errors.push(ValidationIssue::UnknownThreshold);
    }
    for rejection in rejections {
        errors.push(ValidationIssue::InvalidFormat {
            origin: rejection.origin.to_string(),
            reason: rejection.reason.clone(),
        });
    }

    let valid_count = first_by_index.len();
    let need = threshold as usize;
    if valid_count == 0 {
        errors.push(ValidationIssue::NoValidShares);
    } else if valid_count < need {
        errors.push(ValidationIssue::InsufficientShares {
            have: valid_count,
            need,
        });
    }

    let conflicting: Vec<u8> = duplicates
        .iter()
        .filter(|(_, &c)| c)
        .map(|(&i, _)| i)
        .collect();
    let duplicate_indices: Vec<u8> = duplicates.keys().copied().collect();

    let failure = if valid_count == 0 {
        Some(RecoveryFailure::NoValidShares)
    } else if !conflicting.is_empty() {
        Some(RecoveryFailure::DuplicateShares {
            indices: conflicting,
        })
    } else if threshold == 0 {
        Some(RecoveryFailure::InvalidFormat {
            origins: Vec::new(),
        })
    } else if valid_count < need {
        // Enough shares arrived, but repeats of the same index ate into them
        if agreeing >= need && !duplicate_indices.is_empty() {
            Some(RecoveryFailure::DuplicateShares {
                indices: duplicate_indices.clone(),
            })
        } else {
            Some(RecoveryFailure::InsufficientShares {
                have: valid_count,
                need,
            })
        }
    } else if !rejections.is_empty() {
        Some(RecoveryFailure::InvalidFormat {
            origins: rejections.iter().map(|r| r.origin.to_string()).collect(),
        })
    } else {
        None
    };

    ValidationReport {
        is_valid: failure.is_none(),
        valid_count,
        threshold,
        threshold_source,
        duplicate_indices,
        accepted_indices: first_by_index.keys().copied().collect(),
        errors,
        failure,
    }
}

/// Pick the shares handed to the combine primitive: sorted by index, first
/// occurrence per index, agreeing with `threshold`, at most `threshold` of them
pub fn select_shares(shares: &[ShareEnvelope], threshold: u8) -> Vec<&ShareEnvelope> {
    let mut by_index: BTreeMap<u8, &ShareEnvelope> = BTreeMap::new();
    for share in shares.iter().filter(|s| agrees(s, threshold)) {
        by_index.entry(share.index).or_insert(share);
    }
    by_index
        .into_values()
        .take(threshold as usize)
        .collect()
}
