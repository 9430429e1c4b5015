//! Bench Command
//!
//! Quick encode/decode throughput measurement for the configured layout.
//! For statistically sound numbers use `cargo bench --package shardweave-core`.

use super::format_rate;
use anyhow::Result;
use console::style;
use shardweave_core::{CodecConfig, ReedSolomonCodec};
use std::time::Instant;

/// Bench configuration
pub struct BenchConfig {
    pub packet_length: usize,
    pub iterations: usize,
}

/// Timing of one benchmark phase
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub bytes: u64,
    pub seconds: f64,
}

/// Run bench command
pub fn run(codec_config: &CodecConfig, config: BenchConfig) -> Result<()> {
    let codec = ReedSolomonCodec::with_config(*codec_config)?;
    let (encode, decode) = measure(&codec, config.packet_length, config.iterations)?;

    println!("{}", style("Shardweave Benchmark").bold().underlined());
    println!();
    println!(
        "  Layout:   {} of {} ({} workers)",
        codec.data_blocks(),
        codec.total_blocks(),
        codec.config().threads
    );
    println!("  Packet:   {} bytes x {} iterations", config.packet_length, config.iterations);
    println!();
    println!(
        "  Encode:   {}",
        style(format_rate(encode.bytes, encode.seconds)).cyan()
    );
    println!(
        "  Decode:   {}",
        style(format_rate(decode.bytes, decode.seconds)).cyan()
    );
    Ok(())
}

/// Time repair encoding and worst-case decoding (as many sources missing as
/// there are repair blocks). Throughput counts source bytes.
pub fn measure(
    codec: &ReedSolomonCodec,
    len: usize,
    iterations: usize,
) -> Result<(Measurement, Measurement)> {
    let k = codec.data_blocks();
    let n = codec.total_blocks();
    let sources: Vec<Vec<u8>> = (0..k)
        .map(|b| (0..len).map(|i| ((i * 131 + b * 17) % 256) as u8).collect())
        .collect();
    let repair_rows: Vec<u32> = (k as u32..n as u32).collect();
    let mut repairs = vec![vec![0u8; len]; n - k];
    let group_bytes = (k * len * iterations) as u64;

    let started = Instant::now();
    for _ in 0..iterations {
        codec.encode(&sources, &mut repairs, &repair_rows, len)?;
    }
    let encode = Measurement {
        bytes: group_bytes,
        seconds: started.elapsed().as_secs_f64(),
    };

    // Replace the first `n - k` sources with every repair block.
    let lost = (n - k).min(k);
    let mut decode_seconds = 0.0;
    for _ in 0..iterations {
        let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(k);
        let mut rows: Vec<u32> = Vec::with_capacity(k);
        for (i, repair) in repairs.iter().take(lost).enumerate() {
            blocks.push(repair.clone());
            rows.push((k + i) as u32);
        }
        for (i, source) in sources.iter().enumerate().skip(lost) {
            blocks.push(source.clone());
            rows.push(i as u32);
        }

        let started = Instant::now();
        codec.decode(&mut blocks, &mut rows, len)?;
        decode_seconds += started.elapsed().as_secs_f64();
    }
    let decode = Measurement {
        bytes: group_bytes,
        seconds: decode_seconds,
    };

    tracing::info!(
        encode_secs = encode.seconds,
        decode_secs = decode.seconds,
        "benchmark finished"
    );
    Ok((encode, decode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_counts_source_bytes() {
        let codec = ReedSolomonCodec::new(4, 6, 1).unwrap();
        let (encode, decode) = measure(&codec, 256, 3).unwrap();
        assert_eq!(encode.bytes, 4 * 256 * 3);
        assert_eq!(decode.bytes, encode.bytes);
        assert!(encode.seconds >= 0.0 && decode.seconds >= 0.0);
    }

    #[test]
    fn test_measure_without_repairs() {
        let codec = ReedSolomonCodec::new(3, 3, 1).unwrap();
        measure(&codec, 64, 1).unwrap();
    }
}
