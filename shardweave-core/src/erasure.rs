//! Block-group erasure coding
//!
//! Splits one payload into `k` equal (zero-padded) source shards, adds
//! `n - k` repair shards, and rebuilds the payload from any `k` of them.
//! With the default (10, 14) configuration any 4 shards may be lost.

use crate::codec::ReedSolomonCodec;
use crate::config::CodecConfig;
use crate::error::{Result, ShardweaveError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single shard of erasure-coded data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardData {
    /// Shard index (0 to total_blocks-1)
    pub index: u8,
    /// Shard data
    pub data: Bytes,
    /// Whether this is a repair shard
    pub is_parity: bool,
}

impl ShardData {
    pub fn new(index: u8, data: Bytes, is_parity: bool) -> Self {
        Self {
            index,
            data,
            is_parity,
        }
    }

    /// Get shard size
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Payload encoder/decoder built on [`ReedSolomonCodec`]
#[derive(Debug)]
pub struct ErasureEncoder {
    config: CodecConfig,
    codec: ReedSolomonCodec,
}

impl ErasureEncoder {
    /// Encoder with the default (10, 14) configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CodecConfig::default())
    }

    pub fn with_config(config: CodecConfig) -> Result<Self> {
        let codec = ReedSolomonCodec::with_config(config)?;
        Ok(Self {
            config: *codec.config(),
            codec,
        })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn codec(&self) -> &ReedSolomonCodec {
        &self.codec
    }

    /// Encode data into `total_blocks` shards (sources first, then repair)
    pub fn encode(&self, data: &[u8]) -> Result<Vec<ShardData>> {
        let k = self.config.data_blocks;
        let n = self.config.total_blocks;
        let shard_size = self.shard_size(data.len());

        let mut padded = data.to_vec();
        padded.resize(shard_size * k, 0);
        let sources: Vec<&[u8]> = padded.chunks(shard_size).collect();

        let rows: Vec<u32> = (k..n).map(|r| r as u32).collect();
        let mut repairs = vec![vec![0u8; shard_size]; n - k];
        self.codec.encode(&sources, &mut repairs, &rows, shard_size)?;

        let mut shards = Vec::with_capacity(n);
        for (i, source) in sources.iter().enumerate() {
            shards.push(ShardData::new(i as u8, Bytes::copy_from_slice(source), false));
        }
        for (i, repair) in repairs.into_iter().enumerate() {
            shards.push(ShardData::new((k + i) as u8, Bytes::from(repair), true));
        }

        debug!(bytes = data.len(), shard_size, shards = shards.len(), "payload encoded");
        Ok(shards)
    }

    /// Decode shards back into the original payload.
    ///
    /// `shards[i]` is shard `i` or `None` when lost; at least `data_blocks`
    /// must be present. Source shards are preferred over repair shards.
    pub fn decode(&self, shards: &[Option<ShardData>], original_size: usize) -> Result<Bytes> {
        let k = self.config.data_blocks;
        let n = self.config.total_blocks;

        if shards.len() != n {
            return Err(ShardweaveError::ShardCountMismatch {
                expected: n,
                actual: shards.len(),
            });
        }

        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < k {
            return Err(ShardweaveError::InsufficientShards {
                available,
                required: k,
            });
        }

        let shard_size = shards
            .iter()
            .find_map(|s| s.as_ref().map(|s| s.size()))
            .ok_or(ShardweaveError::InsufficientShards {
                available: 0,
                required: k,
            })?;

        let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(k);
        let mut rows: Vec<u32> = Vec::with_capacity(k);
        for (i, shard) in shards.iter().enumerate() {
            let Some(shard) = shard else { continue };
            if shard.index as usize != i {
                return Err(ShardweaveError::InvalidShardIndex {
                    index: shard.index as usize,
                    max: n - 1,
                });
            }
            if shard.size() != shard_size {
                return Err(ShardweaveError::ShardSizeMismatch {
                    expected: shard_size,
                    actual: shard.size(),
                });
            }
            blocks.push(shard.data.to_vec());
            rows.push(i as u32);
            if blocks.len() == k {
                break;
            }
        }

        self.codec.decode(&mut blocks, &mut rows, shard_size)?;

        let mut result = Vec::with_capacity(shard_size * k);
        for block in &blocks {
            result.extend_from_slice(block);
        }
        result.truncate(original_size);
        Ok(Bytes::from(result))
    }

    /// Verify that a full shard set is consistent (for health checking)
    pub fn verify_shards(&self, shards: &[ShardData]) -> Result<bool> {
        if shards.len() != self.config.total_blocks {
            return Ok(false);
        }

        let expected_size = shards.first().map(|s| s.size()).unwrap_or(0);
        if !shards.iter().all(|s| s.size() == expected_size) {
            return Ok(false);
        }

        let blocks: Vec<&[u8]> = shards.iter().map(|s| s.data.as_ref()).collect();
        let rows: Vec<u32> = shards.iter().map(|s| s.index as u32).collect();
        self.codec.verify(&blocks, &rows, expected_size)
    }

    /// Size of each shard for a payload of `data_size` bytes
    fn shard_size(&self, data_size: usize) -> usize {
        data_size.div_ceil(self.config.data_blocks).max(1)
    }
}
