//! Codec configuration for the CLI
//!
//! Resolution order, later wins:
//! 1. Built-in defaults (10 source blocks, 14 total)
//! 2. `[codec]` table of the config file (`--config` / `SHARDWEAVE_CONFIG`)
//! 3. `SHARDWEAVE_DATA_BLOCKS`, `SHARDWEAVE_TOTAL_BLOCKS`, `SHARDWEAVE_THREADS`
//! 4. Command-line flags
//!
//! Config file format:
//! ```toml
//! [codec]
//! data_blocks = 10
//! total_blocks = 14
//! threads = 0
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use shardweave_core::CodecConfig;
use std::path::{Path, PathBuf};

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub data_blocks: Option<usize>,
    pub total_blocks: Option<usize>,
    pub threads: Option<usize>,
}

/// Resolve the codec configuration
pub fn load_config(overrides: &Overrides) -> Result<CodecConfig> {
    let base = match &overrides.config_path {
        Some(path) => load_file(path)?,
        None => CodecConfig::default(),
    };
    let mut config = base
        .with_env_overrides()
        .context("Invalid SHARDWEAVE_* environment override")?;

    if let Some(k) = overrides.data_blocks {
        config.data_blocks = k;
    }
    if let Some(n) = overrides.total_blocks {
        config.total_blocks = n;
    }
    if let Some(threads) = overrides.threads {
        config.threads = threads;
    }
    config.validate().context("Invalid codec parameters")?;

    tracing::debug!(?config, "configuration resolved");
    Ok(config)
}

fn load_file(path: &Path) -> Result<CodecConfig> {
    CodecConfig::from_file(path)
        .with_context(|| format!("Failed to load config file {}", path.display()))
}

#[derive(Serialize)]
struct ConfigFile<'a> {
    codec: &'a CodecConfig,
}

/// Render a configuration in config file format
pub fn to_toml(config: &CodecConfig) -> Result<String> {
    toml::to_string_pretty(&ConfigFile { codec: config }).context("Failed to serialize config")
}
