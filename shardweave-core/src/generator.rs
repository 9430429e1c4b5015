//! Systematic generator matrices
//!
//! For a `(k, n)` code the generator is an `n x k` matrix whose top `k` rows
//! are the identity and whose remaining `n - k` rows hold parity
//! coefficients. It is derived from an `n x k` Vandermonde matrix over the
//! evaluation points `0, 1, a, a^2, ...` so every choice of `k` rows stays
//! invertible.

use crate::error::{Result, ShardweaveError};
use crate::gf::field;
use crate::matrix::Matrix;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Largest supported block count: 255 powers of the primitive element plus
/// the point zero.
pub const MAX_TOTAL_BLOCKS: usize = 256;

/// Immutable `n x k` systematic encoding matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorMatrix {
    k: usize,
    n: usize,
    matrix: Matrix,
}

/// Check `1 <= k <= n <= 256`.
pub fn validate_parameters(k: usize, n: usize) -> Result<()> {
    if k == 0 || k > n || n > MAX_TOTAL_BLOCKS {
        return Err(ShardweaveError::InvalidParameters { k, n });
    }
    Ok(())
}

impl GeneratorMatrix {
    /// Build the generator for `(k, n)`.
    pub fn build(k: usize, n: usize) -> Result<Self> {
        validate_parameters(k, n)?;
        let gf = field();

        // Row 0 evaluates at zero: [1, 0, 0, ...]. Row r > 0 evaluates at
        // a^(r-1): [1, a^(r-1), a^(2(r-1)), ...].
        let mut vandermonde = Matrix::zeros(n, k);
        vandermonde.set(0, 0, 1);
        for row in 1..n {
            for col in 0..k {
                vandermonde.set(row, col, gf.exp((row - 1) * col));
            }
        }

        let mut top = vandermonde.slice_rows(0, k);
        top.invert_vandermonde()?;

        let mut matrix = Matrix::zeros(n, k);
        if n > k {
            let parity = vandermonde.slice_rows(k, n).multiply(&top)?;
            for row in 0..(n - k) {
                matrix.row_mut(k + row).copy_from_slice(parity.row(row));
            }
        }
        for i in 0..k {
            matrix.set(i, i, 1);
        }

        debug!(k, n, "built generator matrix");
        Ok(Self { k, n, matrix })
    }

    /// Process-wide shared generator for `(k, n)`, built on first use.
    pub fn shared(k: usize, n: usize) -> Result<Arc<Self>> {
        static CACHE: OnceLock<RwLock<HashMap<(usize, usize), Arc<GeneratorMatrix>>>> =
            OnceLock::new();
        let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));

        if let Some(existing) = cache.read().get(&(k, n)) {
            return Ok(Arc::clone(existing));
        }

        let built = Arc::new(Self::build(k, n)?);
        let mut guard = cache.write();
        let entry = guard.entry((k, n)).or_insert(built);
        Ok(Arc::clone(entry))
    }

    /// Number of source blocks
    pub fn data_blocks(&self) -> usize {
        self.k
    }

    /// Number of total blocks
    pub fn total_blocks(&self) -> usize {
        self.n
    }

    /// Coefficients used to compute logical row `row` from the `k` sources
    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        self.matrix.row(row)
    }

    /// The `k x k` matrix formed by the listed logical rows
    pub fn submatrix(&self, rows: &[usize]) -> Matrix {
        self.matrix.select_rows(rows)
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every k-subset of 0..n, in lexicographic order.
    fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        let mut current: Vec<usize> = (0..k).collect();
        loop {
            out.push(current.clone());
            let mut i = k;
            loop {
                if i == 0 {
                    return out;
                }
                i -= 1;
                if current[i] != i + n - k {
                    break;
                }
                if i == 0 {
                    return out;
                }
            }
            current[i] += 1;
            for j in i + 1..k {
                current[j] = current[j - 1] + 1;
            }
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(GeneratorMatrix::build(0, 4).is_err());
        assert!(GeneratorMatrix::build(5, 4).is_err());
        assert!(GeneratorMatrix::build(10, 257).is_err());
        assert!(GeneratorMatrix::build(256, 256).is_ok());
        assert!(GeneratorMatrix::build(1, 256).is_ok());
    }

    #[test]
    fn test_systematic_rows() {
        for (k, n) in [(1, 1), (1, 3), (4, 6), (10, 14), (32, 48), (100, 256)] {
            let g = GeneratorMatrix::build(k, n).unwrap();
            assert_eq!(g.as_matrix().slice_rows(0, k), Matrix::identity(k));
            assert_eq!(g.total_blocks(), n);
            assert_eq!(g.data_blocks(), k);
        }
    }

    #[test]
    fn test_parity_rows_have_no_zero_coefficients() {
        let g = GeneratorMatrix::build(10, 14).unwrap();
        for row in 10..14 {
            assert!(g.row(row).iter().all(|&c| c != 0), "row {}", row);
        }
    }

    #[test]
    fn test_every_subset_is_invertible() {
        for (k, n) in [(1, 4), (2, 5), (3, 7), (4, 6), (4, 8), (5, 10)] {
            let g = GeneratorMatrix::build(k, n).unwrap();
            for rows in combinations(n, k) {
                let original = g.submatrix(&rows);
                let mut inverse = original.clone();
                inverse
                    .invert()
                    .unwrap_or_else(|_| panic!("k={} n={} rows={:?}", k, n, rows));
                assert_eq!(original.multiply(&inverse).unwrap(), Matrix::identity(k));
            }
        }
    }

    #[test]
    fn test_all_parity_rows_invertible_at_full_width() {
        // k = n - k: the all-parity selection is the hardest case.
        let g = GeneratorMatrix::build(128, 256).unwrap();
        let rows: Vec<usize> = (128..256).collect();
        let mut m = g.submatrix(&rows);
        m.invert().unwrap();
    }

    #[test]
    fn test_shared_cache_returns_same_instance() {
        let a = GeneratorMatrix::shared(6, 9).unwrap();
        let b = GeneratorMatrix::shared(6, 9).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(GeneratorMatrix::shared(9, 6).is_err());
    }

    #[test]
    fn test_combinations_helper() {
        assert_eq!(combinations(4, 2).len(), 6);
        assert_eq!(combinations(6, 4).len(), 15);
        assert_eq!(combinations(3, 3), vec![vec![0, 1, 2]]);
    }
}
