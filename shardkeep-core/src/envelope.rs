//! Share envelope codec
//!
//! A share travels as one line of text: standard base64 wrapping a JSON
//! record.
//!
//! ```text
//! base64({"index":1,"threshold":3,"total":5,"share":"01a3f2..."})
//! ```
//!
//! `share` carries the payload produced by the splitting primitive in
//! lowercase hex. `total` is informational and may be absent.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while decoding an envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Input is empty")]
    Empty,

    #[error("Outer layer is not base64: {0}")]
    Transport(String),

    #[error("Inner record is not a JSON object: {0}")]
    Record(String),

    #[error("Missing field `{0}`")]
    MissingField(&'static str),

    #[error("Field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },

    #[error("Total {total} is less than threshold {threshold}")]
    TotalBelowThreshold { total: u8, threshold: u8 },

    #[error("Share payload is not valid hex: {0}")]
    Payload(String),
}

/// One shard of a split secret
#[derive(Clone, PartialEq, Eq)]
pub struct ShareEnvelope {
    /// 1-based position of this share within its set
    pub index: u8,
    /// Shares required to reconstruct. `0` means the threshold was never
    /// recorded; only legacy data built in code can carry it.
    pub threshold: u8,
    /// Shares originally generated
    pub total: Option<u8>,
    /// Opaque share bytes for the combine primitive
    pub payload: Vec<u8>,
}

#[derive(Serialize)]
struct WireRecord<'a> {
    index: u8,
    threshold: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u8>,
    share: &'a str,
}

#[derive(Deserialize)]
struct RawRecord {
    index: Option<u64>,
    threshold: Option<u64>,
    total: Option<u64>,
    share: Option<String>,
}

impl ShareEnvelope {
    pub fn new(index: u8, threshold: u8, total: Option<u8>, payload: Vec<u8>) -> Self {
        Self {
            index,
            threshold,
            total,
            payload,
        }
    }

    /// Payload in the string form handed to the combine primitive
    pub fn payload_hex(&self) -> String {
        hex::encode(&self.payload)
    }

    /// Encode to the transport string
    pub fn encode(&self) -> String {
        let share = self.payload_hex();
        let record = WireRecord {
            index: self.index,
            threshold: self.threshold,
            total: self.total,
            share: &share,
        };
        // Serializing a struct of integers and a string cannot fail
        let json = serde_json::to_vec(&record).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Decode a transport string
    pub fn decode(input: &str) -> Result<Self, DecodeError> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(DecodeError::Empty);
        }

        let json = STANDARD
            .decode(&compact)
            .or_else(|_| STANDARD_NO_PAD.decode(compact.trim_end_matches('=')))
            .map_err(|e| DecodeError::Transport(e.to_string()))?;

        let raw: RawRecord =
            serde_json::from_slice(&json).map_err(|e| DecodeError::Record(e.to_string()))?;

        let index = required_u8("index", raw.index)?;
        let threshold = required_u8("threshold", raw.threshold)?;
        let share = raw.share.ok_or(DecodeError::MissingField("share"))?;

        let total = match raw.total {
            Some(value) => {
                let total = positive_u8("total", value)?;
                if total < threshold {
                    return Err(DecodeError::TotalBelowThreshold { total, threshold });
                }
                Some(total)
            }
            None => None,
        };

        let payload = hex::decode(share.trim()).map_err(|e| DecodeError::Payload(e.to_string()))?;
        if payload.is_empty() {
            return Err(DecodeError::Payload("empty payload".to_string()));
        }

        Ok(Self {
            index,
            threshold,
            total,
            payload,
        })
    }
}

fn required_u8(field: &'static str, value: Option<u64>) -> Result<u8, DecodeError> {
    positive_u8(field, value.ok_or(DecodeError::MissingField(field))?)
}

fn positive_u8(field: &'static str, value: u64) -> Result<u8, DecodeError> {
    match u8::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(DecodeError::OutOfRange { field, value }),
    }
}

impl fmt::Debug for ShareEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareEnvelope")
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("total", &self.total)
            .field("payload", &format_args!("[{} bytes]", self.payload.len()))
            .finish()
    }
}

impl fmt::Display for ShareEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ShareEnvelope {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Encode an envelope to its transport string
pub fn encode(envelope: &ShareEnvelope) -> String {
    envelope.encode()
}

/// Decode a transport string into an envelope
pub fn decode(input: &str) -> Result<ShareEnvelope, DecodeError> {
    ShareEnvelope::decode(input)
}
