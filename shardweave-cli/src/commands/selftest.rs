//! Selftest Command
//!
//! Encodes random block groups, drops random blocks, and checks that decode
//! restores the sources exactly.

use super::{CHECK, CROSS};
use anyhow::{bail, Result};
use console::style;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use shardweave_core::{CodecConfig, ErasureEncoder, ReedSolomonCodec, ShardData};

/// Selftest configuration
pub struct SelftestConfig {
    pub iterations: usize,
    pub packet_length: usize,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

/// Run selftest command
pub fn run(codec_config: &CodecConfig, config: SelftestConfig) -> Result<()> {
    let seed = config.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let codec = ReedSolomonCodec::with_config(*codec_config)?;
    let k = codec.data_blocks();
    let n = codec.total_blocks();

    println!("{}", style("Shardweave Self-Test").bold().underlined());
    println!();
    println!("  Layout:        {} of {}", style(k).cyan(), style(n).cyan());
    println!("  Workers:       {}", style(codec.config().threads).cyan());
    println!("  Packet length: {}", style(config.packet_length).cyan());
    println!("  Seed:          {}", style(seed).cyan());
    println!();

    let mut failures = 0usize;
    for iteration in 0..config.iterations {
        match round_trip(&codec, &mut rng, config.packet_length) {
            Ok(picked) => {
                tracing::debug!(iteration, ?picked, "round trip ok");
            }
            Err(e) => {
                failures += 1;
                println!("{} iteration {}: {:#}", style(CROSS).red(), iteration, e);
            }
        }
    }

    let payload_ok = payload_round_trip(codec_config, &mut rng)?;
    if !payload_ok {
        failures += 1;
        println!("{} payload round trip mismatch", style(CROSS).red());
    }

    if failures > 0 {
        bail!("{} of {} checks failed (seed {})", failures, config.iterations + 1, seed);
    }

    println!(
        "{} {} block-group round trips and 1 payload round trip passed",
        style(CHECK).green(),
        config.iterations
    );
    Ok(())
}

/// Encode all repair rows, decode from a random `k`-subset, compare
fn round_trip(codec: &ReedSolomonCodec, rng: &mut StdRng, len: usize) -> Result<Vec<u32>> {
    let k = codec.data_blocks();
    let n = codec.total_blocks();

    let sources: Vec<Vec<u8>> = (0..k)
        .map(|_| (0..len).map(|_| rng.gen()).collect())
        .collect();
    let repair_rows: Vec<u32> = (k as u32..n as u32).collect();
    let mut repairs = vec![vec![0u8; len]; n - k];
    codec.encode(&sources, &mut repairs, &repair_rows, len)?;

    let mut picked: Vec<u32> = (0..n as u32).collect();
    picked.shuffle(rng);
    picked.truncate(k);

    let mut blocks: Vec<Vec<u8>> = picked
        .iter()
        .map(|&row| {
            let row = row as usize;
            if row < k {
                sources[row].clone()
            } else {
                repairs[row - k].clone()
            }
        })
        .collect();
    let mut rows = picked.clone();
    codec.decode(&mut blocks, &mut rows, len)?;

    if blocks != sources {
        bail!("decode from rows {:?} did not restore the sources", picked);
    }
    Ok(picked)
}

/// Split a payload, lose the maximum number of shards, rebuild it
fn payload_round_trip(config: &CodecConfig, rng: &mut StdRng) -> Result<bool> {
    let encoder = ErasureEncoder::with_config(*config)?;
    let size = rng.gen_range(1..64 * 1024);
    let payload: Vec<u8> = (0..size).map(|_| rng.gen()).collect();

    let shards = encoder.encode(&payload)?;
    if !encoder.verify_shards(&shards)? {
        return Ok(false);
    }

    let mut opts: Vec<Option<ShardData>> = shards.into_iter().map(Some).collect();
    let mut lost: Vec<usize> = (0..opts.len()).collect();
    lost.shuffle(rng);
    for &i in lost.iter().take(config.repair_blocks()) {
        opts[i] = None;
    }

    let decoded = encoder.decode(&opts, payload.len())?;
    Ok(decoded.as_ref() == payload.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_small_layout() {
        let codec = ReedSolomonCodec::new(3, 5, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            let picked = round_trip(&codec, &mut rng, 64).unwrap();
            assert_eq!(picked.len(), 3);
        }
    }

    #[test]
    fn test_payload_round_trip() {
        let config = CodecConfig::new(4, 7).unwrap().with_threads(1);
        let mut rng = StdRng::seed_from_u64(2);
        assert!(payload_round_trip(&config, &mut rng).unwrap());
    }

    #[test]
    fn test_run_passes() {
        let config = CodecConfig::new(5, 8).unwrap().with_threads(2);
        run(
            &config,
            SelftestConfig {
                iterations: 3,
                packet_length: 128,
                seed: Some(9),
            },
        )
        .unwrap();
    }
}
