//! Split Command
//!
//! Splits a secret into shares, optionally sealing each with a password.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use shardkeep_core::{
    deal, seal_all, Gf256Shamir, PassphraseCipher, SealedShare, ShareConfig, ShareEnvelope,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Split configuration
pub struct SplitConfig {
    pub threshold: u8,
    pub total: u8,
    pub encrypt: bool,
    pub armor: bool,
    pub out_dir: Option<PathBuf>,
    pub secret_file: Option<PathBuf>,
}

/// One share ready to be written or printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub printable: bool,
}

/// Run split command
pub async fn run(config: SplitConfig) -> Result<()> {
    let share_config =
        ShareConfig::new(config.threshold, config.total).context("Invalid share parameters")?;

    if config.encrypt && !config.armor && config.out_dir.is_none() {
        anyhow::bail!("Binary encrypted shares need --out-dir (or use --armor)");
    }

    let secret = read_secret(config.secret_file.as_deref())?;
    let envelopes =
        deal(&Gf256Shamir, secret.as_bytes(), share_config).context("Failed to split secret")?;
    drop(secret);

    let files = if config.encrypt {
        let password = prompt_new_password()?;
        let armor = config.armor;

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        spinner.set_message(format!("Sealing {} shares...", envelopes.len()));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let sealed = tokio::task::spawn_blocking(move || {
            seal_all(&PassphraseCipher::new(), &envelopes, &password, armor)
        })
        .await?
        .context("Failed to seal shares")?;

        spinner.finish_and_clear();
        sealed_files(&sealed)
    } else {
        plain_files(&envelopes)
    };

    match &config.out_dir {
        Some(dir) => {
            for path in write_shares(dir, &files)? {
                println!("{} Wrote {}", style(symbols::CHECK).green(), path.display());
            }
        }
        None => {
            for file in &files {
                if !file.printable {
                    anyhow::bail!("{} is binary; write it with --out-dir", file.name);
                }
                println!("{}", style(format!("# {}", file.name)).dim());
                println!("{}", String::from_utf8_lossy(&file.bytes).trim_end());
                println!();
            }
        }
    }

    println!(
        "{} Any {} of {} shares recover the secret",
        style(symbols::INFO).blue(),
        style(share_config.threshold).cyan(),
        style(share_config.total).cyan()
    );
    if config.encrypt {
        println!(
            "{} Shares are sealed; recovery will ask for the password",
            style(symbols::LOCK).yellow()
        );
    }

    Ok(())
}

/// Read the secret from a file or a hidden prompt
fn read_secret(path: Option<&Path>) -> Result<String> {
    let secret = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read secret from {}", path.display()))?
            .trim_end_matches(['\r', '\n'])
            .to_string(),
        None => rpassword::prompt_password("Secret: ").context("Failed to read secret")?,
    };

    if secret.is_empty() {
        anyhow::bail!("Secret is required");
    }
    Ok(secret)
}

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    let confirm =
        rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

/// Plain shares, one line of text each
pub fn plain_files(envelopes: &[ShareEnvelope]) -> Vec<ShareFile> {
    envelopes
        .iter()
        .map(|e| ShareFile {
            name: format!("share-{}.txt", e.index),
            bytes: format!("{}\n", e.encode()).into_bytes(),
            printable: true,
        })
        .collect()
}

/// Sealed shares, armored or binary
pub fn sealed_files(sealed: &[SealedShare]) -> Vec<ShareFile> {
    sealed
        .iter()
        .map(|s| ShareFile {
            name: s.file_name(),
            bytes: s.as_bytes().to_vec(),
            printable: std::str::from_utf8(s.as_bytes()).is_ok(),
        })
        .collect()
}

/// Write share files into `dir`, refusing to overwrite existing files
pub fn write_shares(dir: &Path, files: &[ShareFile]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.name);
        if path.exists() {
            anyhow::bail!("Refusing to overwrite {}", path.display());
        }
        fs::write(&path, &file.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        written.push(path);
    }
    Ok(written)
}
