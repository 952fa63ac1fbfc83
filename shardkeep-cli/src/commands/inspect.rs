//! Inspect Command
//!
//! Classifies shares and validates the set without reconstructing anything.
//! Encrypted shares are listed but not decrypted, so they do not count
//! towards the threshold here.

use crate::commands::input::{self, InputSource};
use crate::symbols;
use anyhow::Result;
use console::style;
use serde::Serialize;
use shardkeep_core::{
    classify_all, validate_collected, ClassifiedInput, Origin, Rejection, ShareEnvelope,
    ValidationReport,
};

/// Inspect configuration
pub struct InspectConfig {
    pub source: InputSource,
    pub json: bool,
}

/// One classified input
#[derive(Debug, Serialize)]
pub struct InputSummary {
    pub origin: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Everything `inspect` reports
#[derive(Debug, Serialize)]
pub struct Inspection {
    pub inputs: Vec<InputSummary>,
    pub encrypted: usize,
    pub report: ValidationReport,
}

/// Classify and validate without decrypting or combining
pub fn inspect(classified: &[(Origin, ClassifiedInput)]) -> Inspection {
    let mut inputs = Vec::with_capacity(classified.len());
    let mut envelopes: Vec<ShareEnvelope> = Vec::new();
    let mut rejections = Vec::new();
    let mut encrypted = 0;

    for (origin, input) in classified {
        let mut summary = InputSummary {
            origin: origin.to_string(),
            kind: input.kind(),
            index: None,
            threshold: None,
            total: None,
            reason: None,
        };
        match input {
            ClassifiedInput::Envelope(envelope) => {
                summary.index = Some(envelope.index);
                summary.threshold = Some(envelope.threshold);
                summary.total = envelope.total;
                envelopes.push(envelope.clone());
            }
            ClassifiedInput::EncryptedBlob(_) => encrypted += 1,
            ClassifiedInput::Unrecognized(reason) => {
                summary.reason = Some(reason.to_string());
                rejections.push(Rejection::new(origin.clone(), reason.to_string()));
            }
        }
        inputs.push(summary);
    }

    Inspection {
        inputs,
        encrypted,
        report: validate_collected(&envelopes, &rejections),
    }
}

/// Run inspect command
pub fn run(config: InspectConfig) -> Result<()> {
    let (_, inputs) = input::gather(&config.source)?;
    let inspection = inspect(&classify_all(&inputs));

    if config.json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(());
    }

    println!();
    println!("{}", style("Shares").bold().underlined());
    println!("{}", style(symbols::HLINE).dim());
    for summary in &inspection.inputs {
        let detail = match (summary.index, &summary.reason) {
            (Some(index), _) => format!(
                "index {} of {}, threshold {}",
                index,
                summary
                    .total
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                summary.threshold.unwrap_or(0)
            ),
            (None, Some(reason)) => reason.clone(),
            (None, None) => "encrypted, password needed".to_string(),
        };
        let kind = match summary.kind {
            "envelope" => style(summary.kind).green(),
            "unrecognized" => style(summary.kind).red(),
            _ => style(summary.kind).yellow(),
        };
        println!("{:32} {:14} {}", summary.origin, kind, style(detail).dim());
    }
    println!();

    let report = &inspection.report;
    println!("{}", style("Validation").bold().underlined());
    println!("{}", style(symbols::HLINE).dim());
    println!("  Valid shares: {}", style(report.valid_count).cyan());
    println!("  Threshold:    {}", style(report.threshold).cyan());
    for issue in &report.errors {
        println!("  {} {}", style(symbols::WARN).yellow(), issue);
    }
    if inspection.encrypted > 0 {
        println!(
            "  {} {} not counted; run recover to decrypt",
            style(symbols::LOCK).yellow(),
            symbols::count(inspection.encrypted, "encrypted share")
        );
    }
    println!();

    match report.failure() {
        None => println!(
            "{} Enough shares to recover the secret",
            style(symbols::CHECK).green().bold()
        ),
        Some(failure) => {
            println!("{} {}", style(symbols::CROSS).red().bold(), style(failure).red());
            println!("  {}", failure.hint());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardkeep_core::{deal, Gf256Shamir, RawInput, ShareConfig};

    fn classified() -> Vec<(Origin, ClassifiedInput)> {
        let envelopes = deal(&Gf256Shamir, b"secret", ShareConfig::new(2, 3).unwrap()).unwrap();
        let inputs = vec![
            RawInput::line(1, envelopes[0].encode()),
            RawInput::line(
                2,
                "-----BEGIN SHARDKEEP MESSAGE-----\nAAAA\n-----END SHARDKEEP MESSAGE-----",
            ),
            RawInput::line(3, "not a share"),
        ];
        classify_all(&inputs)
    }

    #[test]
    fn test_inspect_summaries() {
        let inspection = inspect(&classified());
        assert_eq!(inspection.inputs.len(), 3);
        assert_eq!(inspection.inputs[0].kind, "envelope");
        assert_eq!(inspection.inputs[0].index, Some(1));
        assert_eq!(inspection.inputs[1].kind, "armored");
        assert_eq!(inspection.inputs[2].kind, "unrecognized");
        assert!(inspection.inputs[2].reason.is_some());
        assert_eq!(inspection.encrypted, 1);

        assert_eq!(inspection.report.valid_count, 1);
        assert!(!inspection.report.is_valid);
    }

    #[test]
    fn test_inspection_json() {
        let json = serde_json::to_value(inspect(&classified())).unwrap();
        assert_eq!(json["inputs"][0]["origin"], "line 1");
        assert_eq!(json["inputs"][0]["threshold"], 2);
        assert!(json["inputs"][1].get("index").is_none());
        assert_eq!(json["report"]["valid_count"], 1);
    }
}
