//! Systematic Reed-Solomon codec
//!
//! A [`ReedSolomonCodec`] is bound to one `(k, n)` configuration and reused
//! for many calls:
//! - `encode`: compute any subset of the `n` logical rows from the `k`
//!   source blocks
//! - `decode`: rebuild the `k` source blocks in place from any `k` distinct
//!   blocks
//! - `cancel`: cooperative cancellation of the call in progress
//!
//! Rows are independent, so both operations fan out across a dedicated
//! worker pool. Only one call runs at a time per codec instance.

use crate::config::CodecConfig;
use crate::error::{Result, ShardweaveError};
use crate::generator::GeneratorMatrix;
use crate::kernel::{default_kernel, MulAddKernel};
use crate::pool::{BufferPool, PooledBuffer, SizedBufferPool};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// Nice value applied to codec worker threads
#[cfg(target_os = "linux")]
const WORKER_NICE: libc::c_int = 10;

/// Cloneable handle that cancels the codec's current call
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation; idempotent and callable from any thread
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ShardweaveError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Reed-Solomon encoder/decoder over GF(2^8)
pub struct ReedSolomonCodec {
    config: CodecConfig,
    matrix: Arc<GeneratorMatrix>,
    pool: Arc<dyn BufferPool>,
    kernel: Arc<dyn MulAddKernel>,
    workers: rayon::ThreadPool,
    call_guard: Mutex<()>,
    cancel: CancelHandle,
}

impl ReedSolomonCodec {
    /// Create a codec for `k` source blocks out of `n` total, using
    /// `thread_count` workers (0 = available parallelism).
    pub fn new(k: usize, n: usize, thread_count: usize) -> Result<Self> {
        let config = CodecConfig::new(k, n)?.with_threads(thread_count);
        Self::with_config(config)
    }

    /// Create a codec with a private scratch pool and the fastest kernel
    pub fn with_config(config: CodecConfig) -> Result<Self> {
        Self::with_options(config, Arc::new(SizedBufferPool::new()), default_kernel())
    }

    /// Create a codec with an explicit scratch pool and kernel
    pub fn with_options(
        config: CodecConfig,
        pool: Arc<dyn BufferPool>,
        kernel: Arc<dyn MulAddKernel>,
    ) -> Result<Self> {
        config.validate()?;
        let matrix = GeneratorMatrix::shared(config.data_blocks, config.total_blocks)?;
        let threads = config.effective_threads();

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("shardweave-codec-{}", i))
            .start_handler(|_| lower_thread_priority())
            .build()
            .map_err(|e| ShardweaveError::Internal(format!("worker pool: {}", e)))?;

        debug!(
            k = config.data_blocks,
            n = config.total_blocks,
            threads,
            kernel = kernel.name(),
            "codec created"
        );

        Ok(Self {
            config: config.with_threads(threads),
            matrix,
            pool,
            kernel,
            workers,
            call_guard: Mutex::new(()),
            cancel: CancelHandle::default(),
        })
    }

    /// Number of source blocks (k)
    pub fn data_blocks(&self) -> usize {
        self.config.data_blocks
    }

    /// Number of total blocks (n)
    pub fn total_blocks(&self) -> usize {
        self.config.total_blocks
    }

    /// Resolved configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn generator(&self) -> &GeneratorMatrix {
        &self.matrix
    }

    /// Cancel the call in progress, if any
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle for cancelling from other threads
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Compute logical rows `target_rows[i]` into `targets[i]`.
    ///
    /// Rows below `k` are copies of the matching source; other rows are
    /// linear combinations of all sources. Only the first `packet_length`
    /// bytes of each buffer are read or written. A cancelled call leaves the
    /// targets in an unspecified state.
    #[instrument(level = "debug", skip_all, fields(k = self.data_blocks(), n = self.total_blocks(), rows = target_rows.len(), packet_length = packet_length))]
    pub fn encode<S, T>(
        &self,
        sources: &[S],
        targets: &mut [T],
        target_rows: &[u32],
        packet_length: usize,
    ) -> Result<()>
    where
        S: AsRef<[u8]> + Sync,
        T: AsMut<[u8]> + Send,
    {
        let k = self.data_blocks();
        expect_count(k, sources.len())?;
        expect_count(target_rows.len(), targets.len())?;
        for s in sources {
            expect_len(packet_length, s.as_ref().len())?;
        }
        for t in targets.iter_mut() {
            expect_len(packet_length, t.as_mut().len())?;
        }
        for &row in target_rows {
            self.expect_row(row)?;
        }

        let _guard = self.call_guard.lock();
        self.cancel.reset();

        let sources: Vec<&[u8]> = sources
            .iter()
            .map(|s| &s.as_ref()[..packet_length])
            .collect();

        self.workers.install(|| {
            targets
                .par_iter_mut()
                .zip(target_rows.par_iter())
                .for_each(|(target, &row)| {
                    let dst = &mut target.as_mut()[..packet_length];
                    if self.encode_row(&sources, dst, row as usize).is_err() {
                        trace!(row, "encode row abandoned");
                    }
                });
        });

        if self.cancel.is_cancelled() {
            warn!("encode cancelled");
            return Err(ShardweaveError::Cancelled);
        }
        Ok(())
    }

    fn encode_row(&self, sources: &[&[u8]], dst: &mut [u8], row: usize) -> Result<()> {
        self.cancel.check()?;
        let k = self.data_blocks();
        if row < k {
            dst.copy_from_slice(sources[row]);
            return Ok(());
        }
        dst.fill(0);
        self.combine(self.matrix.row(row), sources, dst)
    }

    /// `dst ^= sum(coefficients[col] * inputs[col])`, checking for
    /// cancellation before every column.
    fn combine(&self, coefficients: &[u8], inputs: &[&[u8]], dst: &mut [u8]) -> Result<()> {
        for (&coefficient, input) in coefficients.iter().zip(inputs) {
            self.cancel.check()?;
            if coefficient != 0 {
                self.kernel.mul_add(dst, input, coefficient);
            }
        }
        Ok(())
    }

    /// Rebuild the `k` source blocks in place.
    ///
    /// `blocks[i]` holds logical row `rows[i]`; all rows must be distinct and
    /// below `n`. On success `rows[i] == i` and `blocks[i]` is source block
    /// `i`. Blocks already sitting in their own systematic slot are not
    /// modified.
    #[instrument(level = "debug", skip_all, fields(k = self.data_blocks(), n = self.total_blocks(), packet_length = packet_length))]
    pub fn decode<B>(&self, blocks: &mut [B], rows: &mut [u32], packet_length: usize) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]> + Send + Sync,
    {
        let k = self.data_blocks();
        expect_count(k, blocks.len())?;
        expect_count(k, rows.len())?;
        for b in blocks.iter() {
            expect_len(packet_length, b.as_ref().len())?;
        }
        for &row in rows.iter() {
            self.expect_row(row)?;
        }

        let _guard = self.call_guard.lock();
        self.cancel.reset();

        shuffle(blocks, rows, k)?;

        let missing: Vec<usize> = (0..k).filter(|&i| rows[i] as usize >= k).collect();
        if missing.is_empty() {
            trace!("all source blocks present");
            return Ok(());
        }

        let indices: Vec<usize> = rows.iter().map(|&r| r as usize).collect();
        let mut decode_matrix = self.matrix.submatrix(&indices);
        decode_matrix.invert()?;

        let pool: &dyn BufferPool = self.pool.as_ref();
        let inputs: Vec<&[u8]> = blocks
            .iter()
            .map(|b| &b.as_ref()[..packet_length])
            .collect();

        // Every row reads all inputs, so nothing is written back until all
        // scratch rows are complete.
        let recovered: Vec<(usize, PooledBuffer<'_>)> = self.workers.install(|| {
            missing
                .par_iter()
                .map(|&slot| {
                    self.cancel.check()?;
                    let mut scratch = PooledBuffer::zeroed(pool, packet_length);
                    self.combine(decode_matrix.row(slot), &inputs, &mut scratch)?;
                    Ok((slot, scratch))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        drop(inputs);

        if self.cancel.is_cancelled() {
            warn!("decode cancelled");
            return Err(ShardweaveError::Cancelled);
        }

        for (slot, scratch) in &recovered {
            blocks[*slot].as_mut()[..packet_length].copy_from_slice(scratch);
            rows[*slot] = *slot as u32;
        }
        debug!(reconstructed = recovered.len(), "decode complete");
        Ok(())
    }

    /// Check repair blocks against the source blocks.
    ///
    /// `rows` must include every source row `0..k`; each supplied repair row
    /// is recomputed and compared. Returns `false` on the first mismatch.
    #[instrument(level = "debug", skip_all, fields(k = self.data_blocks(), blocks = blocks.len(), packet_length = packet_length))]
    pub fn verify<B>(&self, blocks: &[B], rows: &[u32], packet_length: usize) -> Result<bool>
    where
        B: AsRef<[u8]> + Sync,
    {
        let k = self.data_blocks();
        expect_count(rows.len(), blocks.len())?;
        for b in blocks {
            expect_len(packet_length, b.as_ref().len())?;
        }

        let mut sources: Vec<Option<&[u8]>> = vec![None; k];
        let mut repairs: Vec<(usize, &[u8])> = Vec::new();
        for (block, &row) in blocks.iter().zip(rows) {
            self.expect_row(row)?;
            let data = &block.as_ref()[..packet_length];
            match row as usize {
                r if r < k => sources[r] = Some(data),
                r => repairs.push((r, data)),
            }
        }
        let available = sources.iter().filter(|s| s.is_some()).count();
        let sources: Vec<&[u8]> = sources.into_iter().flatten().collect();
        if sources.len() != k {
            return Err(ShardweaveError::InsufficientShards {
                available,
                required: k,
            });
        }

        let _guard = self.call_guard.lock();
        self.cancel.reset();

        let pool: &dyn BufferPool = self.pool.as_ref();
        let results: Vec<bool> = self.workers.install(|| {
            repairs
                .par_iter()
                .map(|&(row, data)| {
                    let mut scratch = PooledBuffer::zeroed(pool, packet_length);
                    self.combine(self.matrix.row(row), &sources, &mut scratch)?;
                    Ok(&scratch[..] == data)
                })
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(results.into_iter().all(|ok| ok))
    }

    fn expect_row(&self, row: u32) -> Result<()> {
        let n = self.total_blocks();
        if row as usize >= n {
            return Err(ShardweaveError::InvalidShardIndex {
                index: row as usize,
                max: n - 1,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ReedSolomonCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReedSolomonCodec")
            .field("k", &self.data_blocks())
            .field("n", &self.total_blocks())
            .field("threads", &self.config.threads)
            .field("kernel", &self.kernel.name())
            .finish()
    }
}

/// Move every source block whose row is below `k` into slot `row`, pushing
/// whatever occupied that slot out into the freed position.
fn shuffle<B>(blocks: &mut [B], rows: &mut [u32], k: usize) -> Result<()> {
    let mut i = 0;
    while i < k {
        let row = rows[i] as usize;
        if row >= k || row == i {
            i += 1;
            continue;
        }
        if rows[row] as usize == row {
            return Err(ShardweaveError::ShuffleError { slot: i });
        }
        rows.swap(i, row);
        blocks.swap(i, row);
    }
    Ok(())
}

fn expect_count(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ShardweaveError::ShardCountMismatch { expected, actual });
    }
    Ok(())
}

fn expect_len(packet_length: usize, actual: usize) -> Result<()> {
    if actual < packet_length {
        return Err(ShardweaveError::ShardSizeMismatch {
            expected: packet_length,
            actual,
        });
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn lower_thread_priority() {
    // PRIO_PROCESS with id 0 targets the calling thread on Linux.
    // SAFETY: setpriority only reads its integer arguments.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, WORKER_NICE) };
    if rc != 0 {
        trace!("could not lower codec worker priority");
    }
}

#[cfg(not(target_os = "linux"))]
fn lower_thread_priority() {}
