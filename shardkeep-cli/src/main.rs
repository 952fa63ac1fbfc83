//! ShardKeep CLI
//!
//! Command-line client for splitting secrets into shares and recovering them.
//!
//! # Commands
//! - `split` - Split a secret into shares
//! - `recover` - Recover a secret from pasted or uploaded shares
//! - `inspect` - Check shares without recovering the secret
//! - `config` - Show or edit configuration
//!
//! # Configuration
//! Config file: ~/.shardkeep/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand};
use shardkeep_core::RecoveryPolicy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod symbols;

use commands::input::InputSource;
use commands::{inspect, recover, split};

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "shardkeep")]
#[command(about = "Threshold secret sharing CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a secret into shares
    Split {
        /// Shares needed to recover (overrides config file)
        #[arg(short, long)]
        threshold: Option<u8>,

        /// Shares to produce (overrides config file)
        #[arg(short = 'n', long)]
        total: Option<u8>,

        /// Seal each share with a password
        #[arg(short, long)]
        encrypt: bool,

        /// Write sealed shares as armored text
        #[arg(long, conflicts_with = "binary")]
        armor: bool,

        /// Write sealed shares as binary files
        #[arg(long)]
        binary: bool,

        /// Directory for share files (prints to stdout when omitted)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Read the secret from a file instead of prompting
        #[arg(long)]
        secret_file: Option<PathBuf>,
    },

    /// Recover a secret from shares
    Recover {
        /// Share files to upload
        files: Vec<PathBuf>,

        /// Read pasted shares from stdin, one per line
        #[arg(short, long)]
        paste: bool,

        /// Give up after this many wrong passwords
        #[arg(long, env = "SHARDKEEP_MAX_PASSWORD_ATTEMPTS")]
        max_attempts: Option<u32>,

        /// Ignore inputs that are not shares
        #[arg(long)]
        tolerate_unrecognized: bool,

        /// Write the secret to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify shares and validate the set without recovering
    Inspect {
        /// Share files to inspect
        files: Vec<PathBuf>,

        /// Read pasted shares from stdin, one per line
        #[arg(short, long)]
        paste: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., split.threshold, recovery.max_password_attempts)
        key: String,
        /// Value to set
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; RUST_LOG replaces the default level
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        ))
        .init();

    let cli = Cli::parse();

    // Load configuration from ~/.shardkeep/config.toml
    let cfg = config::load_config();

    match cli.command {
        Commands::Split {
            threshold,
            total,
            encrypt,
            armor,
            binary,
            out_dir,
            secret_file,
        } => {
            // CLI args override config file
            let config = split::SplitConfig {
                threshold: threshold.unwrap_or(cfg.split.threshold),
                total: total.unwrap_or(cfg.split.total),
                encrypt,
                armor: armor || (cfg.split.armor && !binary),
                out_dir: out_dir.or(cfg.split.out_dir),
                secret_file,
            };
            split::run(config).await?;
        }

        Commands::Recover {
            files,
            paste,
            max_attempts,
            tolerate_unrecognized,
            output,
        } => {
            let defaults = cfg.recovery.policy();
            let config = recover::RecoverConfig {
                source: InputSource { paste, files },
                policy: RecoveryPolicy {
                    max_password_attempts: max_attempts.or(defaults.max_password_attempts),
                    tolerate_unrecognized: tolerate_unrecognized || defaults.tolerate_unrecognized,
                },
                output,
            };
            if !recover::run(config).await? {
                std::process::exit(1);
            }
        }

        Commands::Inspect { files, paste, json } => {
            let config = inspect::InspectConfig {
                source: InputSource { paste, files },
                json,
            };
            inspect::run(config)?;
        }

        Commands::Config { command } => {
            handle_config_command(command)?;
        }
    }

    Ok(())
}

/// `RUST_LOG` directives when set and valid, otherwise warnings only
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Handle config subcommands
fn handle_config_command(command: Option<ConfigCommands>) -> Result<()> {
    use console::style;

    match command {
        None | Some(ConfigCommands::Show) => {
            // Show current configuration
            let cfg = config::load_config();
            println!();
            println!("{}", style("ShardKeep Configuration").bold().underlined());
            println!();
            println!("{}", style("[recovery]").cyan());
            match cfg.recovery.max_password_attempts {
                Some(max) => println!("  max_password_attempts = {}", max),
                None => println!("  max_password_attempts = {}", style("(unlimited)").dim()),
            }
            println!(
                "  tolerate_unrecognized = {}",
                cfg.recovery.tolerate_unrecognized
            );
            println!();
            println!("{}", style("[split]").cyan());
            println!("  threshold = {}", cfg.split.threshold);
            println!("  total = {}", cfg.split.total);
            println!("  armor = {}", cfg.split.armor);
            if let Some(dir) = &cfg.split.out_dir {
                println!("  out_dir = \"{}\"", dir.display());
            }
            println!();

            // Show config file path
            if let Ok(path) = config::config_file_path() {
                println!("{} {}", style("Config file:").dim(), path.display());
                if !path.exists() {
                    println!(
                        "{} Run '{}' to create it",
                        style("(not created yet)").yellow(),
                        style("shardkeep config init").green()
                    );
                }
            }
        }

        Some(ConfigCommands::Path) => {
            if let Ok(path) = config::config_file_path() {
                println!("{}", path.display());
            }
        }

        Some(ConfigCommands::Init { force }) => {
            let path = config::config_file_path()?;
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(symbols::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config(&config::ShardKeepConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(symbols::CHECK).green(),
                path.display()
            );
        }

        Some(ConfigCommands::Set { key, value }) => {
            let mut cfg = config::load_config();
            config::apply_setting(&mut cfg, &key, &value)?;
            config::save_config(&cfg)?;
            println!("{} Configuration updated", style(symbols::CHECK).green());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_filter_is_warn() {
        assert_eq!(log_filter(None).to_string(), "warn");
    }

    #[test]
    fn test_rust_log_replaces_default() {
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
        assert_eq!(
            log_filter(Some("shardkeep_core=trace")).to_string(),
            "shardkeep_core=trace"
        );
    }

    #[test]
    fn test_cli_parses_recover() {
        let cli = Cli::try_parse_from(["shardkeep", "recover", "--paste", "--max-attempts", "3"])
            .unwrap();
        match cli.command {
            Commands::Recover {
                paste,
                max_attempts,
                files,
                ..
            } => {
                assert!(paste);
                assert_eq!(max_attempts, Some(3));
                assert!(files.is_empty());
            }
            _ => panic!("expected recover"),
        }
    }
}
