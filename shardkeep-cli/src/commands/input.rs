//! Share input gathering
//!
//! Reads shares either from pasted text on stdin (one share per line,
//! armored blocks kept whole) or from files.

use anyhow::{Context, Result};
use console::style;
use shardkeep_core::{paste_units, Channel, RawInput};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;

/// Where to read shares from
pub struct InputSource {
    pub paste: bool,
    pub files: Vec<PathBuf>,
}

/// Read every input unit together with the channel it arrived on
pub fn gather(source: &InputSource) -> Result<(Channel, Vec<RawInput>)> {
    if source.paste && !source.files.is_empty() {
        anyhow::bail!("Use either --paste or share files, not both");
    }

    if source.paste {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            eprintln!(
                "{}",
                style("Paste shares, one per line, then press Ctrl-D").dim()
            );
        }
        let inputs = read_paste(stdin.lock())?;
        return Ok((Channel::Paste, inputs));
    }

    if source.files.is_empty() {
        anyhow::bail!("No shares given. Pass share files or use --paste");
    }
    Ok((Channel::Upload, read_files(&source.files)?))
}

/// Split pasted text into input units
pub fn read_paste(mut reader: impl Read) -> Result<Vec<RawInput>> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .context("Failed to read pasted shares")?;
    Ok(paste_units(&text))
}

/// Read each file as one input unit
pub fn read_files(files: &[PathBuf]) -> Result<Vec<RawInput>> {
    files
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(RawInput::file(path.display().to_string(), bytes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardkeep_core::{Origin, RawContent};

    #[test]
    fn test_read_paste_skips_blank_lines() {
        let text = "first\n\n  second  \n";
        let inputs = read_paste(text.as_bytes()).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].origin, Origin::Line(1));
        assert_eq!(inputs[1].origin, Origin::Line(3));
        assert_eq!(inputs[1].content, RawContent::Text("second".into()));
    }

    #[test]
    fn test_read_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("share-1.txt");
        std::fs::write(&path, b"abc").unwrap();

        let inputs = read_files(&[path.clone()]).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].origin, Origin::File(path.display().to_string()));
        assert_eq!(inputs[0].content, RawContent::Bytes(b"abc".to_vec()));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_files(&[dir.path().join("missing.txt")]).unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn test_gather_needs_a_source() {
        let none = InputSource {
            paste: false,
            files: Vec::new(),
        };
        assert!(gather(&none).is_err());

        let both = InputSource {
            paste: true,
            files: vec![PathBuf::from("a.txt")],
        };
        assert!(gather(&both).is_err());
    }
}
