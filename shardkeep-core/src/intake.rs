//! Intake channels
//!
//! Shares reach a recovery session through one of two channels:
//! - Paste: free text, one share per line. Armored ciphertext spans several
//!   lines and is kept together as one unit.
//! - Upload: one unit per file, content kept as raw bytes.

use crate::detect::ARMOR_MARKERS;
use crate::envelope::ShareEnvelope;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session collects its shares from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Paste,
    Upload,
}

impl Channel {
    /// Whether inputs from `origin` belong to this channel
    pub fn accepts(&self, origin: &Origin) -> bool {
        matches!(
            (self, origin),
            (Channel::Paste, Origin::Line(_)) | (Channel::Upload, Origin::File(_))
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Paste => write!(f, "paste"),
            Channel::Upload => write!(f, "upload"),
        }
    }
}

/// Identifies one raw input for error reporting
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Origin {
    /// 1-based line number of a pasted unit (first line for armored blocks)
    Line(usize),
    /// Uploaded file name
    File(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Line(n) => write!(f, "line {}", n),
            Origin::File(name) => write!(f, "file {}", name),
        }
    }
}

/// Content of one raw input unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawContent {
    /// Pasted text
    Text(String),
    /// File content, not yet known to be text
    Bytes(Vec<u8>),
}

impl From<&str> for RawContent {
    fn from(s: &str) -> Self {
        RawContent::Text(s.to_string())
    }
}

impl From<String> for RawContent {
    fn from(s: String) -> Self {
        RawContent::Text(s)
    }
}

impl From<Vec<u8>> for RawContent {
    fn from(bytes: Vec<u8>) -> Self {
        RawContent::Bytes(bytes)
    }
}

/// One raw input unit with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInput {
    pub origin: Origin,
    pub content: RawContent,
}

impl RawInput {
    /// A pasted unit starting at `line` (1-based)
    pub fn line(line: usize, text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Line(line),
            content: RawContent::Text(text.into()),
        }
    }

    /// An uploaded file
    pub fn file(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            origin: Origin::File(name.into()),
            content: RawContent::Bytes(bytes),
        }
    }
}

const ARMOR_CLOSE: &str = "-----END ";

fn opens_armor(line: &str) -> bool {
    ARMOR_MARKERS.iter().any(|m| line.starts_with(m))
}

/// Split pasted text into input units
///
/// Blank lines are skipped. A line starting with an encrypted-message armor
/// marker starts a unit that runs through the next `-----END ` line. A block
/// that is never closed ends at the next armor marker, at the next line that
/// is a share envelope, or at the end of the text.
pub fn paste_units(text: &str) -> Vec<RawInput> {
    let mut units = Vec::new();
    let mut armor: Option<(usize, Vec<&str>)> = None;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim();

        if let Some((start, mut block)) = armor.take() {
            let interrupts = !trimmed.is_empty()
                && (opens_armor(trimmed) || ShareEnvelope::decode(trimmed).is_ok());
            if !interrupts {
                block.push(trimmed);
                if trimmed.starts_with(ARMOR_CLOSE) {
                    units.push(RawInput::line(start, block.join("\n")));
                } else {
                    armor = Some((start, block));
                }
                continue;
            }
            units.push(RawInput::line(start, block.join("\n")));
        }

        if trimmed.is_empty() {
            continue;
        }

        if opens_armor(trimmed) {
            armor = Some((line_no, vec![trimmed]));
        } else {
            units.push(RawInput::line(line_no, trimmed));
        }
    }

    if let Some((start, block)) = armor {
        units.push(RawInput::line(start, block.join("\n")));
    }

    units
}
