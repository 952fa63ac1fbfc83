//! Recover Command
//!
//! Reconstructs a secret from pasted or uploaded shares.

use crate::commands::input::{self, InputSource};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use shardkeep_core::{
    drive, ClassifiedInput, PasswordResponse, PasswordSource, RecoveredSecret, RecoveryFailure,
    RecoveryPolicy, RecoverySession, SessionStatus,
};
use std::path::PathBuf;
use std::time::Duration;

/// Recover configuration
pub struct RecoverConfig {
    pub source: InputSource,
    pub policy: RecoveryPolicy,
    pub output: Option<PathBuf>,
}

/// Prompts on the terminal; shows a spinner while a password is tried
struct TerminalPrompt {
    encrypted: usize,
    spinner: Option<ProgressBar>,
}

impl TerminalPrompt {
    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl PasswordSource for TerminalPrompt {
    async fn request_password(&mut self, is_retry: bool) -> PasswordResponse {
        self.stop_spinner();

        if is_retry {
            eprintln!(
                "{} Wrong password. Try again, or press Enter to give up",
                style(symbols::WARN).yellow()
            );
        } else {
            eprintln!(
                "{} {} found",
                style(symbols::LOCK).yellow(),
                symbols::count(self.encrypted, "encrypted share")
            );
        }

        let answer =
            tokio::task::spawn_blocking(|| rpassword::prompt_password("Password: ")).await;
        match answer {
            Ok(Ok(password)) if !password.is_empty() => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg}")
                        .unwrap(),
                );
                spinner.set_message("Decrypting shares...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                self.spinner = Some(spinner);
                PasswordResponse::Provided(password)
            }
            _ => PasswordResponse::Cancelled,
        }
    }
}

/// Run recover command. Returns whether the secret was recovered.
pub async fn run(config: RecoverConfig) -> Result<bool> {
    let (channel, inputs) = input::gather(&config.source)?;

    let mut session = RecoverySession::standard(channel, config.policy);
    session.intake(inputs).context("Failed to read shares")?;
    print_intake(&session);

    let mut prompt = TerminalPrompt {
        encrypted: session.pending_blobs().count(),
        spinner: None,
    };
    let session = drive(session, &mut prompt).await?;
    prompt.stop_spinner();

    match session.status() {
        SessionStatus::Succeeded(secret) => {
            report_secret(secret, config.output.as_ref())?;
            Ok(true)
        }
        SessionStatus::Failed(failure) => {
            for rejection in session.undecryptable() {
                eprintln!(
                    "  {} {}: {}",
                    style(symbols::LOCK).yellow(),
                    rejection.origin,
                    style(&rejection.reason).dim()
                );
            }
            report_failure(failure);
            Ok(false)
        }
        other => anyhow::bail!("Recovery stopped early: {}", other.phase()),
    }
}

fn print_intake(session: &RecoverySession) {
    let mut envelopes = 0;
    let mut encrypted = 0;
    for (_, input) in session.collected() {
        match input {
            ClassifiedInput::Envelope(_) => envelopes += 1,
            ClassifiedInput::EncryptedBlob(_) => encrypted += 1,
            ClassifiedInput::Unrecognized(_) => {}
        }
    }

    eprintln!(
        "{} Read {} ({} encrypted)",
        style(symbols::INFO).blue(),
        symbols::count(envelopes + encrypted, "share"),
        encrypted
    );
    for rejection in session.rejections() {
        eprintln!(
            "  {} {}: {}",
            style(symbols::WARN).yellow(),
            rejection.origin,
            style(&rejection.reason).dim()
        );
    }
}

fn report_secret(secret: &RecoveredSecret, output: Option<&PathBuf>) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, secret.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!(
            "{} Secret written to {}",
            style(symbols::CHECK).green().bold(),
            path.display()
        );
        return Ok(());
    }

    eprintln!("{} Secret recovered", style(symbols::KEY).green().bold());
    match secret.as_utf8() {
        Some(text) => println!("{}", text),
        None => println!("{}", hex::encode(secret.as_bytes())),
    }
    Ok(())
}

fn report_failure(failure: &RecoveryFailure) {
    eprintln!("{} {}", style(symbols::CROSS).red().bold(), style(failure).red());
    eprintln!("  {}", failure.hint());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recover_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let envelopes = shardkeep_core::deal(
            &shardkeep_core::Gf256Shamir,
            b"launch codes",
            shardkeep_core::ShareConfig::new(2, 3).unwrap(),
        )
        .unwrap();
        let files = crate::commands::split::plain_files(&envelopes[1..]);
        let paths = crate::commands::split::write_shares(dir.path(), &files).unwrap();

        let output = dir.path().join("secret.out");
        let config = RecoverConfig {
            source: InputSource {
                paste: false,
                files: paths,
            },
            policy: RecoveryPolicy::default(),
            output: Some(output.clone()),
        };
        assert!(run(config).await.unwrap());
        assert_eq!(std::fs::read(&output).unwrap(), b"launch codes");
    }

    #[tokio::test]
    async fn test_recover_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let envelopes = shardkeep_core::deal(
            &shardkeep_core::Gf256Shamir,
            b"launch codes",
            shardkeep_core::ShareConfig::new(2, 3).unwrap(),
        )
        .unwrap();
        let files = crate::commands::split::plain_files(&envelopes[..1]);
        let paths = crate::commands::split::write_shares(dir.path(), &files).unwrap();

        let config = RecoverConfig {
            source: InputSource {
                paste: false,
                files: paths,
            },
            policy: RecoveryPolicy::default(),
            output: None,
        };
        assert!(!run(config).await.unwrap());
    }
}
