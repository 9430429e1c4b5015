//! Shardweave CLI
//!
//! Operator tool for the Shardweave erasure codec.
//!
//! # Commands
//! - `matrix` - Print the generator matrix for a layout
//! - `selftest` - Randomized encode/lose/decode round trips
//! - `bench` - Quick encode/decode throughput measurement
//! - `config` - Show the resolved configuration
//!
//! # Configuration
//! Optional TOML file (`--config` or `SHARDWEAVE_CONFIG`) with a `[codec]`
//! table, overridden by `SHARDWEAVE_*` variables and then by flags.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{bench, matrix, selftest};

#[derive(Parser)]
#[command(name = "shardweave")]
#[command(about = "Shardweave Reed-Solomon erasure coding tool")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file with a [codec] table
    #[arg(long, global = true, env = "SHARDWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of source blocks (k)
    #[arg(short = 'k', long, global = true)]
    data_blocks: Option<usize>,

    /// Number of source + repair blocks (n)
    #[arg(short = 'n', long, global = true)]
    total_blocks: Option<usize>,

    /// Worker threads (0 = one per core)
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generator matrix
    Matrix {
        /// Include the identity rows
        #[arg(short, long)]
        all: bool,

        /// Print coefficients in decimal
        #[arg(short, long)]
        decimal: bool,
    },

    /// Run randomized encode/decode round trips
    Selftest {
        /// Number of block-group round trips
        #[arg(short, long, default_value = "100")]
        iterations: usize,

        /// Bytes per block
        #[arg(short, long, default_value = "4096")]
        packet_length: usize,

        /// RNG seed for a reproducible run
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Measure encode/decode throughput
    Bench {
        /// Bytes per block
        #[arg(short, long, default_value = "1048576")]
        packet_length: usize,

        /// Number of timed iterations
        #[arg(short, long, default_value = "10")]
        iterations: usize,
    },

    /// Show the resolved configuration as TOML
    Config,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let overrides = config::Overrides {
        config_path: cli.config,
        data_blocks: cli.data_blocks,
        total_blocks: cli.total_blocks,
        threads: cli.threads,
    };
    let codec_config = config::load_config(&overrides)?;

    match cli.command {
        Commands::Matrix { all, decimal } => {
            matrix::run(&codec_config, matrix::MatrixConfig { all, decimal })?;
        }

        Commands::Selftest {
            iterations,
            packet_length,
            seed,
        } => {
            let config = selftest::SelftestConfig {
                iterations,
                packet_length,
                seed,
            };
            selftest::run(&codec_config, config)?;
        }

        Commands::Bench {
            packet_length,
            iterations,
        } => {
            let config = bench::BenchConfig {
                packet_length,
                iterations,
            };
            bench::run(&codec_config, config)?;
        }

        Commands::Config => {
            print!("{}", config::to_toml(&codec_config)?);
        }
    }

    Ok(())
}
