//! Shardweave Core Library
//!
//! Erasure coding engine for the Shardweave content distribution network.
//! This crate provides:
//! - GF(2^8) arithmetic and pluggable multiply-accumulate kernels
//! - Matrix inversion (Gauss-Jordan and Vandermonde) over the field
//! - Systematic generator matrices for any `1 <= k <= n <= 256`
//! - A parallel, cancellable Reed-Solomon codec
//! - Block-group helpers for splitting and rebuilding payloads

pub mod codec;
pub mod config;
pub mod erasure;
pub mod error;
pub mod generator;
pub mod gf;
pub mod kernel;
pub mod matrix;
pub mod pool;

pub use codec::{CancelHandle, ReedSolomonCodec};
pub use config::CodecConfig;
pub use erasure::{ErasureEncoder, ShardData};
pub use error::{Result, ShardweaveError};
pub use generator::GeneratorMatrix;
pub use kernel::{default_kernel, MulAddKernel, NibbleKernel, TableKernel};
pub use matrix::Matrix;
pub use pool::{BufferPool, PoolStats, PooledBuffer, SizedBufferPool};

/// Default block group layout
/// - 10 source blocks: minimum required to reconstruct
/// - 14 total blocks: tolerates the loss of any 4
///
/// Override at runtime via SHARDWEAVE_DATA_BLOCKS / SHARDWEAVE_TOTAL_BLOCKS.
pub const DATA_BLOCKS: usize = 10;
pub const TOTAL_BLOCKS: usize = 14;
