//! Input format detection
//!
//! Classifies one raw input unit as a plain share envelope, an encrypted
//! blob (armored or binary), or unrecognized. Checks run in a fixed order:
//!
//! 1. Text starting with an armor marker: armored ciphertext. This wins even
//!    when the same text would also decode as an envelope.
//! 2. Text that decodes as an envelope
//! 3. Binary content whose leading bytes match a known ciphertext packet
//! 4. Binary content with an ambiguous packet signature: look at it as text.
//!    Armored text goes to (1); short or control-laden text keeps the binary
//!    classification; anything else is unrecognized.
//! 5. Everything else is unrecognized
//!
//! Uploaded bytes that are valid UTF-8 without stray control characters are
//! treated as text, so a share saved to a file classifies the same as a
//! pasted one.

use crate::crypto::{ARMOR_BEGIN, SEALED_MAGIC, SEALED_VERSION};
use crate::envelope::{DecodeError, ShareEnvelope};
use crate::intake::{Origin, RawContent, RawInput};
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

/// OpenPGP ASCII armor marker for encrypted messages
pub const PGP_ARMOR_MARKER: &str = "-----BEGIN PGP MESSAGE-----";

/// Armor markers recognized as encrypted shares
pub const ARMOR_MARKERS: &[&str] = &[PGP_ARMOR_MARKER, ARMOR_BEGIN];

/// Decoded text shorter than this cannot be armored ciphertext
const MIN_PLAUSIBLE_TEXT: usize = 32;

/// Smallest binary blob worth matching against packet signatures
const MIN_PACKET_BYTES: usize = 4;

const UTF8_BOM: &str = "\u{feff}";

/// An encrypted share awaiting a password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub raw: Vec<u8>,
    pub armored: bool,
}

impl EncryptedBlob {
    /// Armored text view of the blob
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.raw).ok()
    }
}

/// Why an input was not recognized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unrecognized {
    #[error("input is empty")]
    Empty,

    #[error("not a share: {0}")]
    NotAShare(DecodeError),

    #[error("binary content with no known ciphertext signature")]
    UnknownBinary,

    #[error("binary content resembles a ciphertext packet but is not armored text")]
    AmbiguousBinary,
}

/// Result of classifying one raw input unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedInput {
    Envelope(ShareEnvelope),
    EncryptedBlob(EncryptedBlob),
    Unrecognized(Unrecognized),
}

impl ClassifiedInput {
    /// Short label for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedInput::Envelope(_) => "envelope",
            ClassifiedInput::EncryptedBlob(EncryptedBlob { armored: true, .. }) => "armored",
            ClassifiedInput::EncryptedBlob(EncryptedBlob { armored: false, .. }) => "binary",
            ClassifiedInput::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Result of matching leading bytes against ciphertext packet signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketSignature {
    /// A recognized ciphertext packet
    Known(&'static str),
    /// Looks like a packet header, but not one we know
    Ambiguous,
    /// No packet structure
    None,
}

/// Match leading bytes against known ciphertext packet signatures
pub fn sniff_signature(bytes: &[u8]) -> PacketSignature {
    if bytes.starts_with(SEALED_MAGIC) {
        return match bytes.get(SEALED_MAGIC.len()) {
            Some(&SEALED_VERSION) => PacketSignature::Known("shardkeep-sealed"),
            _ => PacketSignature::Ambiguous,
        };
    }

    let Some(&first) = bytes.first() else {
        return PacketSignature::None;
    };

    // OpenPGP packet headers always have bit 7 set
    if first & 0x80 == 0 {
        return PacketSignature::None;
    }

    let tag = if first & 0x40 != 0 {
        first & 0x3f
    } else {
        (first >> 2) & 0x0f
    };

    if bytes.len() < MIN_PACKET_BYTES {
        return PacketSignature::Ambiguous;
    }

    match tag {
        1 => PacketSignature::Known("openpgp-pkesk"),
        3 => PacketSignature::Known("openpgp-skesk"),
        9 => PacketSignature::Known("openpgp-sed"),
        18 => PacketSignature::Known("openpgp-seipd"),
        20 => PacketSignature::Known("openpgp-aead"),
        _ => PacketSignature::Ambiguous,
    }
}

fn armor_marker(text: &str) -> Option<&'static str> {
    ARMOR_MARKERS.iter().copied().find(|m| text.starts_with(m))
}

fn has_stray_control(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

/// Steps 1, 2 and 5 for text content
fn classify_text(text: &str) -> ClassifiedInput {
    let trimmed = text.trim_start_matches(UTF8_BOM).trim();
    if trimmed.is_empty() {
        return ClassifiedInput::Unrecognized(Unrecognized::Empty);
    }

    if armor_marker(trimmed).is_some() {
        return ClassifiedInput::EncryptedBlob(EncryptedBlob {
            raw: trimmed.as_bytes().to_vec(),
            armored: true,
        });
    }

    match ShareEnvelope::decode(trimmed) {
        Ok(envelope) => ClassifiedInput::Envelope(envelope),
        Err(e) => ClassifiedInput::Unrecognized(Unrecognized::NotAShare(e)),
    }
}

/// Steps 3 to 5 for content that is not plausible text
fn classify_binary(bytes: &[u8]) -> ClassifiedInput {
    match sniff_signature(bytes) {
        PacketSignature::Known(name) => {
            debug!(signature = name, "Matched ciphertext packet signature");
            ClassifiedInput::EncryptedBlob(EncryptedBlob {
                raw: bytes.to_vec(),
                armored: false,
            })
        }
        PacketSignature::Ambiguous => classify_ambiguous(bytes),
        PacketSignature::None => ClassifiedInput::Unrecognized(Unrecognized::UnknownBinary),
    }
}

fn classify_ambiguous(bytes: &[u8]) -> ClassifiedInput {
    let lossy = String::from_utf8_lossy(bytes);
    // NUL padding is common when text is written through a binary buffer
    let text = lossy
        .trim_start_matches(UTF8_BOM)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0');

    if armor_marker(text).is_some() {
        return ClassifiedInput::EncryptedBlob(EncryptedBlob {
            raw: text.as_bytes().to_vec(),
            armored: true,
        });
    }

    let implausible = text.len() < MIN_PLAUSIBLE_TEXT
        || has_stray_control(text)
        || text.contains(char::REPLACEMENT_CHARACTER);

    if implausible {
        ClassifiedInput::EncryptedBlob(EncryptedBlob {
            raw: bytes.to_vec(),
            armored: false,
        })
    } else {
        ClassifiedInput::Unrecognized(Unrecognized::AmbiguousBinary)
    }
}

/// Classify one raw input unit
pub fn classify(raw: &RawContent) -> ClassifiedInput {
    match raw {
        RawContent::Text(text) => classify_text(text),
        RawContent::Bytes(bytes) => {
            if bytes.is_empty() {
                return ClassifiedInput::Unrecognized(Unrecognized::Empty);
            }
            match std::str::from_utf8(bytes) {
                Ok(text) if !has_stray_control(text.trim_start_matches(UTF8_BOM)) => {
                    classify_text(text)
                }
                _ => classify_binary(bytes),
            }
        }
    }
}

/// Classify a batch of inputs in parallel, keeping input order
pub fn classify_all(inputs: &[RawInput]) -> Vec<(Origin, ClassifiedInput)> {
    inputs
        .par_iter()
        .map(|input| {
            let classified = classify(&input.content);
            debug!(origin = %input.origin, kind = classified.kind(), "Classified input");
            (input.origin.clone(), classified)
        })
        .collect()
}
