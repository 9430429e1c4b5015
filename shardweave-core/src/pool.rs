//! Scratch buffer pool
//!
//! Decode needs one temporary buffer per reconstructed row. Buffers are drawn
//! from a pool keyed by size and handed back through [`PooledBuffer`], which
//! returns its buffer on drop so every exit path (success, error, cancel)
//! gives the memory back.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Byte-buffer pool collaborator
pub trait BufferPool: Send + Sync {
    /// Take a buffer of exactly `size` bytes. Contents are unspecified.
    fn take(&self, size: usize) -> Vec<u8>;

    /// Hand a buffer back to the pool.
    fn release(&self, buffer: Vec<u8>);
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers handed out
    pub taken: u64,
    /// Buffers handed back
    pub returned: u64,
    /// Buffers currently held for reuse
    pub pooled_buffers: usize,
    /// Bytes currently held for reuse
    pub pooled_bytes: usize,
}

impl PoolStats {
    /// Buffers taken and not yet returned
    pub fn outstanding(&self) -> u64 {
        self.taken.saturating_sub(self.returned)
    }
}

/// Pool that keeps up to `max_per_size` idle buffers for each size
pub struct SizedBufferPool {
    buckets: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    max_per_size: usize,
    taken: AtomicU64,
    returned: AtomicU64,
}

impl SizedBufferPool {
    /// Default idle buffers kept per size
    pub const DEFAULT_MAX_PER_SIZE: usize = 32;

    pub fn new() -> Self {
        Self::with_max_per_size(Self::DEFAULT_MAX_PER_SIZE)
    }

    pub fn with_max_per_size(max_per_size: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_per_size,
            taken: AtomicU64::new(0),
            returned: AtomicU64::new(0),
        }
    }

    /// Drop every idle buffer
    pub fn clear(&self) {
        self.buckets.lock().clear();
    }

    pub fn stats(&self) -> PoolStats {
        let buckets = self.buckets.lock();
        PoolStats {
            taken: self.taken.load(Ordering::SeqCst),
            returned: self.returned.load(Ordering::SeqCst),
            pooled_buffers: buckets.values().map(Vec::len).sum(),
            pooled_bytes: buckets
                .iter()
                .map(|(size, bufs)| size * bufs.len())
                .sum(),
        }
    }
}

impl Default for SizedBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool for SizedBufferPool {
    fn take(&self, size: usize) -> Vec<u8> {
        self.taken.fetch_add(1, Ordering::SeqCst);
        let reused = self
            .buckets
            .lock()
            .get_mut(&size)
            .and_then(|bucket| bucket.pop());
        reused.unwrap_or_else(|| vec![0u8; size])
    }

    fn release(&self, buffer: Vec<u8>) {
        self.returned.fetch_add(1, Ordering::SeqCst);
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(buffer.len()).or_default();
        if bucket.len() < self.max_per_size {
            bucket.push(buffer);
        }
    }
}

/// A buffer leased from a pool, returned when dropped
pub struct PooledBuffer<'a> {
    pool: &'a dyn BufferPool,
    buffer: Option<Vec<u8>>,
}

impl<'a> PooledBuffer<'a> {
    /// Lease a buffer of `size` bytes
    pub fn take(pool: &'a dyn BufferPool, size: usize) -> Self {
        Self {
            pool,
            buffer: Some(pool.take(size)),
        }
    }

    /// Lease a buffer of `size` bytes, zero-filled
    pub fn zeroed(pool: &'a dyn BufferPool, size: usize) -> Self {
        let mut lease = Self::take(pool, size);
        lease.fill(0);
        lease
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}
