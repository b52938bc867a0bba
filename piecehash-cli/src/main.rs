//! piecehash CLI
//!
//! Command-line tool for computing piece hash tree roots of local files.
//!
//! # Commands
//! - `hash` - Compute the hash tree root of a file
//! - `config` - Show or edit configuration
//!
//! # Configuration
//! Config file: ~/.piecehash/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod symbols;

use commands::hash;
use config::{Engine, OutputFormat};

#[derive(Parser)]
#[command(name = "piecehash")]
#[command(about = "Erasure-coded piece hash trees for stored objects")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.piecehash/config.toml)
    #[arg(long, global = true, env = "PIECEHASH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the hash tree root of a file
    Hash {
        /// Path to the file
        path: PathBuf,

        /// Hash engine
        #[arg(short, long, value_enum, env = "PIECEHASH_ENGINE")]
        engine: Option<Engine>,

        /// Worker count for the parallel engine
        #[arg(short, long, env = "PIECEHASH_WORKERS")]
        workers: Option<usize>,

        /// Segment size in bytes
        #[arg(long, env = "PIECEHASH_SEGMENT_SIZE")]
        segment_size: Option<usize>,

        /// Data shards per segment
        #[arg(long, env = "PIECEHASH_DATA_SHARDS")]
        data_shards: Option<usize>,

        /// Parity shards per segment
        #[arg(long, env = "PIECEHASH_PARITY_SHARDS")]
        parity_shards: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
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
        /// Configuration key (e.g., hashing.segment_size, cli.engine)
        key: String,
        /// Value to set
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_file_path()?,
    };

    match cli.command {
        Commands::Hash {
            path,
            engine,
            workers,
            segment_size,
            data_shards,
            parity_shards,
            format,
            quiet,
        } => {
            // Flags and environment override the config file
            let cfg = config::load_config(&config_path)?;
            let mut hashing = cfg.hashing;
            if let Some(size) = segment_size {
                hashing.segment_size = size;
            }
            if let Some(data) = data_shards {
                hashing.data_shards = data;
            }
            if let Some(parity) = parity_shards {
                hashing.parity_shards = parity;
            }

            let options = hash::HashOptions {
                path,
                engine: engine.unwrap_or(cfg.cli.engine),
                workers: workers.unwrap_or(cfg.cli.workers),
                format: format.unwrap_or(cfg.cli.format),
                progress: !quiet && console::Term::stderr().is_term(),
            };
            hash::run(&hashing, options)?;
        }

        Commands::Config { command } => {
            handle_config_command(&config_path, command)?;
        }
    }

    Ok(())
}

/// Handle config subcommands
fn handle_config_command(path: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let cfg = config::load_config(path)?;
            println!();
            println!("{}", style("piecehash Configuration").bold().underlined());
            println!();
            println!("{}", style("[hashing]").cyan());
            println!("  segment_size = {}", cfg.hashing.segment_size);
            println!("  data_shards = {}", cfg.hashing.data_shards);
            println!("  parity_shards = {}", cfg.hashing.parity_shards);
            println!();
            println!("{}", style("[cli]").cyan());
            println!("  engine = {:?}", cfg.cli.engine);
            println!("  workers = {}", cfg.cli.workers);
            println!("  format = {:?}", cfg.cli.format);
            println!();

            println!("{} {}", style("Config file:").dim(), path.display());
            if !path.exists() {
                println!(
                    "{} Run '{}' to create it",
                    style("(not created yet)").yellow(),
                    style("piecehash config init").green()
                );
            }
        }

        Some(ConfigCommands::Path) => {
            println!("{}", path.display());
        }

        Some(ConfigCommands::Init { force }) => {
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(symbols::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config(path, &config::PieceHashConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(symbols::CHECK).green(),
                path.display()
            );
        }

        Some(ConfigCommands::Set { key, value }) => {
            let mut cfg = config::load_config(path)?;
            config::set_value(&mut cfg, &key, &value)?;
            config::save_config(path, &cfg)?;
            println!("{} Configuration updated", style(symbols::CHECK).green());
        }
    }

    Ok(())
}
