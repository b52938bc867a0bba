//! Configuration management
//!
//! Handles storing and loading the CLI configuration.
//! Config directory: ~/.piecehash/ (cross-platform)
//!
//! Config file format (~/.piecehash/config.toml):
//! ```toml
//! [hashing]
//! segment_size = 16777216
//! data_shards = 4
//! parity_shards = 2
//!
//! [cli]
//! engine = "parallel"
//! workers = 5
//! format = "hex"
//! ```
//!
//! Values are layered: config file, then `PIECEHASH_*` environment
//! variables, then command-line flags.

use anyhow::{Context, Result};
use clap::ValueEnum;
use piecehash_core::{HashConfig, MAX_WORKERS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Structure of ~/.piecehash/config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceHashConfig {
    /// Segment size and erasure layout
    #[serde(default)]
    pub hashing: HashConfig,

    /// CLI-specific settings
    #[serde(default)]
    pub cli: CliSettings,
}

/// Hash engine selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// One pass over the file
    Batch,
    /// Chunked appends through the streaming hasher
    Stream,
    /// Bounded worker pool
    #[default]
    Parallel,
}

/// Output encoding of the roots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Hex,
    Base64,
    Json,
}

/// CLI-specific settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliSettings {
    /// Default hash engine
    #[serde(default)]
    pub engine: Engine,

    /// Worker count for the parallel engine
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            workers: default_workers(),
            format: OutputFormat::default(),
        }
    }
}

fn default_workers() -> usize {
    MAX_WORKERS
}

/// Get the config directory path (~/.piecehash/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".piecehash"))
}

/// Get the default config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from `path`.
/// Falls back to defaults if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<PieceHashConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PieceHashConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: PieceHashConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    if let Err(e) = config.hashing.validate() {
        warn!(path = %path.display(), error = %e, "config file has an invalid hashing layout");
    }
    Ok(config)
}

/// Save configuration to `path`, creating its directory
pub fn save_config(path: &Path, config: &PieceHashConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}

/// Set one `section.key` value
pub fn set_value(config: &mut PieceHashConfig, key: &str, value: &str) -> Result<()> {
    let size = || {
        value
            .parse::<usize>()
            .with_context(|| format!("{} expects a positive integer, got {:?}", key, value))
    };
    let variant = |name: &str| anyhow::anyhow!("{} is not a valid value for {}", value, name);

    match key {
        "hashing.segment_size" => config.hashing.segment_size = size()?,
        "hashing.data_shards" => config.hashing.data_shards = size()?,
        "hashing.parity_shards" => config.hashing.parity_shards = size()?,
        "cli.workers" => config.cli.workers = size()?,
        "cli.engine" => {
            config.cli.engine = Engine::from_str(value, true).map_err(|_| variant("cli.engine"))?
        }
        "cli.format" => {
            config.cli.format =
                OutputFormat::from_str(value, true).map_err(|_| variant("cli.format"))?
        }
        _ => anyhow::bail!(
            "Unknown config key: {}. Valid keys: hashing.segment_size, hashing.data_shards, hashing.parity_shards, cli.engine, cli.workers, cli.format",
            key
        ),
    }

    config.hashing.validate()?;
    Ok(())
}
