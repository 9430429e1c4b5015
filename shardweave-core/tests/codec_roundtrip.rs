//! Encode → lose blocks → decode round trips through the public codec API
//!
//! Run with: cargo test --test codec_roundtrip

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use shardweave_core::{
    CodecConfig, MulAddKernel, ReedSolomonCodec, ShardweaveError, SizedBufferPool, TableKernel,
};
use std::sync::Arc;

fn random_blocks(rng: &mut StdRng, count: usize, len: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|_| (0..len).map(|_| rng.gen()).collect())
        .collect()
}

/// All `n` logical blocks: sources followed by freshly encoded repairs
fn encode_all(codec: &ReedSolomonCodec, sources: &[Vec<u8>], len: usize) -> Vec<Vec<u8>> {
    let k = codec.data_blocks();
    let n = codec.total_blocks();
    let rows: Vec<u32> = (k as u32..n as u32).collect();
    let mut repairs = vec![vec![0u8; len]; n - k];
    codec.encode(sources, &mut repairs, &rows, len).unwrap();
    let mut all = sources.to_vec();
    all.extend(repairs);
    all
}

fn decode_subset(codec: &ReedSolomonCodec, all: &[Vec<u8>], picked: &[usize], len: usize) -> Vec<Vec<u8>> {
    let mut blocks: Vec<Vec<u8>> = picked.iter().map(|&i| all[i].clone()).collect();
    let mut rows: Vec<u32> = picked.iter().map(|&i| i as u32).collect();
    codec.decode(&mut blocks, &mut rows, len).unwrap();
    let expected: Vec<u32> = (0..codec.data_blocks() as u32).collect();
    assert_eq!(rows, expected);
    blocks
}

#[test]
fn test_four_of_six_scenario() {
    let codec = ReedSolomonCodec::new(4, 6, 2).unwrap();
    let mut rng = StdRng::seed_from_u64(46);
    let sources = random_blocks(&mut rng, 4, 256);

    let mut repairs = vec![vec![0u8; 256]; 2];
    codec.encode(&sources, &mut repairs, &[4, 5], 256).unwrap();
    let (r0, r1) = (repairs[0].clone(), repairs[1].clone());

    // {S1, S3, R0, R1} rebuilds S0 and S2
    let mut blocks = vec![sources[1].clone(), sources[3].clone(), r0.clone(), r1.clone()];
    let mut rows = vec![1u32, 3, 4, 5];
    codec.decode(&mut blocks, &mut rows, 256).unwrap();
    assert_eq!(rows, vec![0, 1, 2, 3]);
    assert_eq!(blocks, sources);

    // Duplicated repair row: the decode matrix is singular
    let mut blocks = vec![r0.clone(), r1.clone(), sources[0].clone(), sources[1].clone()];
    let mut rows = vec![4u32, 4, 0, 1];
    assert_eq!(
        codec.decode(&mut blocks, &mut rows, 256),
        Err(ShardweaveError::SingularMatrix)
    );

    // Duplicated source row: the shuffle detects the conflict
    let mut blocks = vec![r0, r1, sources[0].clone(), sources[1].clone()];
    let mut rows = vec![4u32, 5, 0, 0];
    assert!(matches!(
        codec.decode(&mut blocks, &mut rows, 256),
        Err(ShardweaveError::ShuffleError { .. })
    ));
}

#[test]
fn test_every_subset_round_trips() {
    let mut rng = StdRng::seed_from_u64(7);
    for (k, n) in [(1, 3), (2, 4), (3, 6), (4, 6), (5, 8)] {
        let codec = ReedSolomonCodec::new(k, n, 2).unwrap();
        let len = 64 + k;
        let sources = random_blocks(&mut rng, k, len);
        let all = encode_all(&codec, &sources, len);

        for mask in 0u32..(1 << n) {
            if mask.count_ones() as usize != k {
                continue;
            }
            let mut picked: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
            picked.shuffle(&mut rng);
            let decoded = decode_subset(&codec, &all, &picked, len);
            assert_eq!(decoded, sources, "k={} n={} picked={:?}", k, n, picked);
        }
    }
}

#[test]
fn test_large_group_random_losses() {
    let mut rng = StdRng::seed_from_u64(99);
    let (k, n) = (32, 48);
    let codec = ReedSolomonCodec::new(k, n, 4).unwrap();
    let len = 4096;
    let sources = random_blocks(&mut rng, k, len);
    let all = encode_all(&codec, &sources, len);

    for _ in 0..10 {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        indices.truncate(k);
        assert_eq!(decode_subset(&codec, &all, &indices, len), sources);
    }

    // All repair blocks plus the minimum number of sources
    let mut picked: Vec<usize> = (k..n).collect();
    picked.extend(0..(k - (n - k)));
    assert_eq!(decode_subset(&codec, &all, &picked, len), sources);
}

#[test]
fn test_full_width_code() {
    let mut rng = StdRng::seed_from_u64(256);
    let (k, n) = (100, 256);
    let codec = ReedSolomonCodec::new(k, n, 0).unwrap();
    let len = 64;
    let sources = random_blocks(&mut rng, k, len);
    let all = encode_all(&codec, &sources, len);

    let picked: Vec<usize> = (n - k..n).collect();
    assert_eq!(decode_subset(&codec, &all, &picked, len), sources);
}

#[test]
fn test_partial_repair_request_matches_full_encode() {
    let codec = ReedSolomonCodec::new(6, 12, 3).unwrap();
    let mut rng = StdRng::seed_from_u64(12);
    let sources = random_blocks(&mut rng, 6, 333);
    let all = encode_all(&codec, &sources, 333);

    let mut some = vec![vec![0u8; 333]; 2];
    codec.encode(&sources, &mut some, &[11, 7], 333).unwrap();
    assert_eq!(some[0], all[11]);
    assert_eq!(some[1], all[7]);
}

#[test]
fn test_decode_leaves_systematic_slots_alone() {
    let codec = ReedSolomonCodec::new(4, 6, 2).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let sources = random_blocks(&mut rng, 4, 128);
    let all = encode_all(&codec, &sources, 128);

    let mut blocks = vec![all[0].clone(), all[5].clone(), all[2].clone(), all[3].clone()];
    let mut rows = vec![0u32, 5, 2, 3];
    let before: Vec<*const u8> = blocks.iter().map(|b| b.as_ptr()).collect();
    codec.decode(&mut blocks, &mut rows, 128).unwrap();

    assert_eq!(blocks, sources);
    // Untouched slots keep their original allocations
    for i in [0usize, 2, 3] {
        assert_eq!(blocks[i].as_ptr(), before[i]);
    }
}

#[test]
fn test_kernels_agree_end_to_end() {
    let mut rng = StdRng::seed_from_u64(17);
    let sources = random_blocks(&mut rng, 5, 1000);
    let config = CodecConfig::new(5, 9).unwrap().with_threads(2);

    let table = ReedSolomonCodec::with_options(
        config,
        Arc::new(SizedBufferPool::new()),
        Arc::new(TableKernel),
    )
    .unwrap();
    let fast = ReedSolomonCodec::with_config(config).unwrap();

    assert_eq!(encode_all(&table, &sources, 1000), encode_all(&fast, &sources, 1000));
}

#[test]
fn test_concurrent_calls_on_one_codec() {
    let codec = Arc::new(ReedSolomonCodec::new(8, 12, 2).unwrap());
    let mut handles = Vec::new();
    for seed in 0..4u64 {
        let codec = Arc::clone(&codec);
        handles.push(std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let sources = random_blocks(&mut rng, 8, 2048);
            for _ in 0..5 {
                let all = encode_all(&codec, &sources, 2048);
                let picked: Vec<usize> = (4..12).collect();
                assert_eq!(decode_subset(&codec, &all, &picked, 2048), sources);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}

/// Kernel that cancels its codec after a fixed number of calls
struct CancellingKernel {
    handle: parking_lot::Mutex<Option<shardweave_core::CancelHandle>>,
    calls: std::sync::atomic::AtomicUsize,
    cancel_after: usize,
}

impl MulAddKernel for CancellingKernel {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    fn mul_add(&self, dst: &mut [u8], src: &[u8], coefficient: u8) {
        let seen = self
            .calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if seen + 1 >= self.cancel_after {
            if let Some(handle) = self.handle.lock().as_ref() {
                handle.cancel();
            }
        }
        TableKernel.mul_add(dst, src, coefficient);
    }
}

fn cancelling_codec(k: usize, n: usize, cancel_after: usize) -> (ReedSolomonCodec, Arc<SizedBufferPool>, Arc<CancellingKernel>) {
    let pool = Arc::new(SizedBufferPool::new());
    let kernel = Arc::new(CancellingKernel {
        handle: parking_lot::Mutex::new(None),
        calls: std::sync::atomic::AtomicUsize::new(0),
        cancel_after,
    });
    let codec = ReedSolomonCodec::with_options(
        CodecConfig::new(k, n).unwrap().with_threads(2),
        pool.clone(),
        kernel.clone(),
    )
    .unwrap();
    *kernel.handle.lock() = Some(codec.cancel_handle());
    (codec, pool, kernel)
}

#[test]
fn test_cancelled_encode_reports_cancelled() {
    let (codec, _pool, _kernel) = cancelling_codec(8, 16, 1);
    let mut rng = StdRng::seed_from_u64(21);
    let sources = random_blocks(&mut rng, 8, 512);
    let rows: Vec<u32> = (8..16).collect();
    let mut repairs = vec![vec![0u8; 512]; 8];
    assert_eq!(
        codec.encode(&sources, &mut repairs, &rows, 512),
        Err(ShardweaveError::Cancelled)
    );
}

#[test]
fn test_cancelled_decode_returns_scratch_buffers() {
    let mut rng = StdRng::seed_from_u64(22);
    let sources = random_blocks(&mut rng, 8, 512);

    // Encode with a plain codec, then decode with one that cancels itself
    let plain = ReedSolomonCodec::new(8, 16, 2).unwrap();
    let all = encode_all(&plain, &sources, 512);

    let (codec, pool, kernel) = cancelling_codec(8, 16, 3);
    let mut blocks: Vec<Vec<u8>> = (8..16).map(|i| all[i].clone()).collect();
    let mut rows: Vec<u32> = (8..16).collect();
    assert_eq!(
        codec.decode(&mut blocks, &mut rows, 512),
        Err(ShardweaveError::Cancelled)
    );
    assert_eq!(pool.stats().outstanding(), 0);

    // The next call on the same codec is not affected by the old flag once
    // the kernel stops cancelling.
    *kernel.handle.lock() = None;
    let mut blocks: Vec<Vec<u8>> = (8..16).map(|i| all[i].clone()).collect();
    let mut rows: Vec<u32> = (8..16).collect();
    codec.decode(&mut blocks, &mut rows, 512).unwrap();
    assert_eq!(blocks, sources);
    assert_eq!(pool.stats().outstanding(), 0);
}

#[test]
fn test_cancel_from_another_thread_never_panics() {
    let pool = Arc::new(SizedBufferPool::new());
    let codec = Arc::new(
        ReedSolomonCodec::with_options(
            CodecConfig::new(16, 24).unwrap().with_threads(4),
            pool.clone(),
            Arc::new(TableKernel),
        )
        .unwrap(),
    );
    let mut rng = StdRng::seed_from_u64(23);
    let sources = random_blocks(&mut rng, 16, 64 * 1024);
    let plain = ReedSolomonCodec::new(16, 24, 2).unwrap();
    let all = encode_all(&plain, &sources, 64 * 1024);

    let handle = codec.cancel_handle();
    let canceller = std::thread::spawn(move || {
        for _ in 0..50 {
            handle.cancel();
            std::thread::sleep(std::time::Duration::from_micros(200));
        }
    });

    for _ in 0..20 {
        let mut blocks: Vec<Vec<u8>> = (8..24).map(|i| all[i].clone()).collect();
        let mut rows: Vec<u32> = (8..24).collect();
        match codec.decode(&mut blocks, &mut rows, 64 * 1024) {
            Ok(()) => assert_eq!(blocks, sources),
            Err(e) => assert_eq!(e, ShardweaveError::Cancelled),
        }
    }
    canceller.join().unwrap();
    assert_eq!(pool.stats().outstanding(), 0);
}
