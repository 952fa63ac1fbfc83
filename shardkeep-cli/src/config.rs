//! Configuration management
//!
//! Handles storing and loading CLI configuration.
//! Config directory: ~/.shardkeep/ (cross-platform)
//!
//! Config file format (~/.shardkeep/config.toml):
//! ```toml
//! [recovery]
//! max_password_attempts = 5
//! tolerate_unrecognized = false
//!
//! [split]
//! threshold = 3
//! total = 5
//! armor = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shardkeep_core::RecoveryPolicy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Structure of ~/.shardkeep/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShardKeepConfig {
    /// Recovery settings
    #[serde(default)]
    pub recovery: RecoverySettings,

    /// Defaults for `shardkeep split`
    #[serde(default)]
    pub split: SplitSettings,
}

/// Recovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySettings {
    /// Give up after this many wrong passwords (unlimited when unset)
    #[serde(default = "default_max_password_attempts")]
    pub max_password_attempts: Option<u32>,

    /// Ignore inputs that are not shares instead of failing
    #[serde(default = "default_tolerate_unrecognized")]
    pub tolerate_unrecognized: bool,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            max_password_attempts: default_max_password_attempts(),
            tolerate_unrecognized: default_tolerate_unrecognized(),
        }
    }
}

impl RecoverySettings {
    pub fn policy(&self) -> RecoveryPolicy {
        RecoveryPolicy {
            max_password_attempts: self.max_password_attempts,
            tolerate_unrecognized: self.tolerate_unrecognized,
        }
    }
}

fn default_max_password_attempts() -> Option<u32> {
    std::env::var("SHARDKEEP_MAX_PASSWORD_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse().ok())
}

fn default_tolerate_unrecognized() -> bool {
    std::env::var("SHARDKEEP_TOLERATE_UNRECOGNIZED")
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Split defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSettings {
    /// Shares needed to recover
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    /// Shares to produce
    #[serde(default = "default_total")]
    pub total: u8,

    /// Write encrypted shares as armored text rather than binary
    #[serde(default = "default_armor")]
    pub armor: bool,

    /// Directory to write share files into
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            total: default_total(),
            armor: default_armor(),
            out_dir: None,
        }
    }
}

fn default_threshold() -> u8 {
    shardkeep_core::share_config_from_env().0
}

fn default_total() -> u8 {
    shardkeep_core::share_config_from_env().1
}

fn default_armor() -> bool {
    true
}

/// Keys accepted by `shardkeep config set`
pub const SETTABLE_KEYS: &[&str] = &[
    "recovery.max_password_attempts",
    "recovery.tolerate_unrecognized",
    "split.threshold",
    "split.total",
    "split.armor",
    "split.out_dir",
];

/// Apply one `key = value` setting
pub fn apply_setting(cfg: &mut ShardKeepConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "recovery.max_password_attempts" => {
            cfg.recovery.max_password_attempts = match value {
                "" | "none" | "unlimited" => None,
                v => Some(v.parse().context("Expected a number or 'none'")?),
            }
        }
        "recovery.tolerate_unrecognized" => {
            cfg.recovery.tolerate_unrecognized = value.parse().context("Expected true or false")?
        }
        "split.threshold" => cfg.split.threshold = value.parse().context("Expected 1-255")?,
        "split.total" => cfg.split.total = value.parse().context("Expected 1-255")?,
        "split.armor" => cfg.split.armor = value.parse().context("Expected true or false")?,
        "split.out_dir" => {
            cfg.split.out_dir = match value {
                "" | "none" => None,
                v => Some(PathBuf::from(v)),
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                SETTABLE_KEYS.join(", ")
            );
        }
    }
    Ok(())
}

/// Get the config directory path (~/.shardkeep/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let config_dir = home.join(".shardkeep");

    // Create directory if it doesn't exist
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory ~/.shardkeep/")?;
    }

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from ~/.shardkeep/config.toml
/// Falls back to defaults if the file doesn't exist
pub fn load_config() -> ShardKeepConfig {
    match config_file_path() {
        Ok(path) => load_config_from(&path),
        Err(_) => ShardKeepConfig::default(),
    }
}

/// Load configuration from a specific file, falling back to defaults
pub fn load_config_from(path: &Path) -> ShardKeepConfig {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return ShardKeepConfig::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded config file");
                config
            }
            Err(e) => {
                eprintln!("Warning: Failed to parse config file: {}", e);
                ShardKeepConfig::default()
            }
        },
        Err(e) => {
            eprintln!("Warning: Failed to read config file: {}", e);
            ShardKeepConfig::default()
        }
    }
}

/// Save configuration to ~/.shardkeep/config.toml
pub fn save_config(config: &ShardKeepConfig) -> Result<()> {
    save_config_to(config, &config_file_path()?)
}

/// Save configuration to a specific file
pub fn save_config_to(config: &ShardKeepConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}
