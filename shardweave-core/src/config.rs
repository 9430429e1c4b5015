//! Codec configuration
//!
//! Loaded from defaults, a TOML table, or environment variables:
//!
//! ```toml
//! [codec]
//! data_blocks = 10
//! total_blocks = 14
//! threads = 0      # 0 = one worker per available core
//! ```
//!
//! Environment overrides: `SHARDWEAVE_DATA_BLOCKS`, `SHARDWEAVE_TOTAL_BLOCKS`,
//! `SHARDWEAVE_THREADS`.

use crate::error::{Result, ShardweaveError};
use crate::generator::validate_parameters;
use crate::{DATA_BLOCKS, TOTAL_BLOCKS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Codec parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Number of source blocks (k)
    #[serde(default = "default_data_blocks")]
    pub data_blocks: usize,
    /// Number of source + repair blocks (n)
    #[serde(default = "default_total_blocks")]
    pub total_blocks: usize,
    /// Worker threads (0 = available parallelism)
    #[serde(default)]
    pub threads: usize,
}

fn default_data_blocks() -> usize {
    DATA_BLOCKS
}

fn default_total_blocks() -> usize {
    TOTAL_BLOCKS
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            data_blocks: DATA_BLOCKS,
            total_blocks: TOTAL_BLOCKS,
            threads: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    codec: Option<CodecConfig>,
}

impl CodecConfig {
    /// Create and validate a config
    pub fn new(data_blocks: usize, total_blocks: usize) -> Result<Self> {
        let config = Self {
            data_blocks,
            total_blocks,
            threads: 0,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the worker thread count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Number of repair blocks
    pub fn repair_blocks(&self) -> usize {
        self.total_blocks.saturating_sub(self.data_blocks)
    }

    /// Storage overhead ratio (repair/data)
    pub fn overhead_ratio(&self) -> f64 {
        self.repair_blocks() as f64 / self.data_blocks as f64
    }

    /// Worker threads to spawn, resolving 0 to the hardware parallelism
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_parameters(self.data_blocks, self.total_blocks)
    }

    /// Parse the `[codec]` table of a TOML document; a missing table yields
    /// the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let config = file.codec.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShardweaveError::Configuration(format!("cannot read {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_usize("SHARDWEAVE_DATA_BLOCKS")? {
            self.data_blocks = v;
        }
        if let Some(v) = env_usize("SHARDWEAVE_TOTAL_BLOCKS")? {
            self.total_blocks = v;
        }
        if let Some(v) = env_usize("SHARDWEAVE_THREADS")? {
            self.threads = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ShardweaveError::Configuration(format!("{} must be an integer, got {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}
