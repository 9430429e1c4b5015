//! Matrix Command
//!
//! Prints the generator matrix for the configured `(k, n)`.

use anyhow::Result;
use console::style;
use shardweave_core::{CodecConfig, GeneratorMatrix};

/// Matrix configuration
pub struct MatrixConfig {
    /// Print the identity rows too
    pub all: bool,
    /// Print coefficients in decimal instead of hex
    pub decimal: bool,
}

/// Run matrix command
pub fn run(codec: &CodecConfig, config: MatrixConfig) -> Result<()> {
    let k = codec.data_blocks;
    let n = codec.total_blocks;
    let matrix = GeneratorMatrix::shared(k, n)?;

    println!(
        "{}",
        style(format!("Generator matrix ({} x {})", n, k)).bold().underlined()
    );
    println!();

    let start = if config.all { 0 } else { k };
    if start == n {
        println!("{}", style("(no repair rows)").dim());
        return Ok(());
    }

    for row in start..n {
        let cells: Vec<String> = matrix
            .row(row)
            .iter()
            .map(|&c| {
                if config.decimal {
                    format!("{:3}", c)
                } else {
                    format!("{:02x}", c)
                }
            })
            .collect();
        let label = format!("{:>4}", row);
        if row < k {
            println!("{} {}", style(label).dim(), style(cells.join(" ")).dim());
        } else {
            println!("{} {}", style(label).cyan(), cells.join(" "));
        }
    }

    Ok(())
}
