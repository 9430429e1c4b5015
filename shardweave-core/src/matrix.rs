//! Dense matrices over GF(2^8)
//!
//! Row-major storage. Addition is XOR, so accumulation is plain `^=`.
//! - `multiply`: standard product
//! - `invert`: in-place Gauss-Jordan with full pivoting
//! - `invert_vandermonde`: O(k^2) inversion for Vandermonde matrices

use crate::error::{Result, ShardweaveError};
use crate::gf::field;
use std::fmt;

/// Dense `rows x cols` matrix over GF(2^8)
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Matrix {
    /// All-zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0u8; rows * cols],
        }
    }

    /// `k x k` identity
    pub fn identity(k: usize) -> Self {
        let mut m = Self::zeros(k, k);
        for i in 0..k {
            m.set(i, i, 1);
        }
        m
    }

    /// Wrap row-major data
    pub fn from_rows(rows: usize, cols: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ShardweaveError::ShardSizeMismatch {
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.data[row * self.cols + col] = value;
    }

    /// Coefficients of one row
    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }

    /// Row-major backing storage
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Rows `start..end` as a new matrix
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        Self {
            rows: end - start,
            cols: self.cols,
            data: self.data[start * self.cols..end * self.cols].to_vec(),
        }
    }

    /// New matrix made of the listed rows, in order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut out = Self::zeros(indices.len(), self.cols);
        for (dst, &src) in indices.iter().enumerate() {
            out.row_mut(dst).copy_from_slice(self.row(src));
        }
        out
    }

    /// `self (n x k) * other (k x m) -> (n x m)`
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(ShardweaveError::ShardSizeMismatch {
                expected: self.cols,
                actual: other.rows,
            });
        }
        let gf = field();
        let mut out = Matrix::zeros(self.rows, other.cols);
        for row in 0..self.rows {
            for col in 0..other.cols {
                let mut acc = 0u8;
                for i in 0..self.cols {
                    acc ^= gf.mul(self.get(row, i), other.get(i, col));
                }
                out.set(row, col, acc);
            }
        }
        Ok(out)
    }

    /// In-place Gauss-Jordan inversion with full pivoting.
    ///
    /// The diagonal element is preferred as pivot; otherwise the first
    /// nonzero entry in an unused row and column is taken. Column swaps are
    /// undone at the end. Fails with `SingularMatrix` when a column has no
    /// usable pivot.
    pub fn invert(&mut self) -> Result<()> {
        if self.rows != self.cols {
            return Err(ShardweaveError::SingularMatrix);
        }
        let k = self.rows;
        let gf = field();

        let mut indxc = vec![0usize; k];
        let mut indxr = vec![0usize; k];
        let mut ipiv = vec![0u8; k];
        let mut id_row = vec![0u8; k];
        let mut pivot_row = vec![0u8; k];

        for col in 0..k {
            let (irow, icol) = self.find_pivot(col, &ipiv)?;
            ipiv[icol] += 1;

            if irow != icol {
                for ix in 0..k {
                    self.data.swap(irow * k + ix, icol * k + ix);
                }
            }
            indxr[col] = irow;
            indxc[col] = icol;

            let c = self.get(icol, icol);
            if c == 0 {
                return Err(ShardweaveError::SingularMatrix);
            }
            if c != 1 {
                // Writing 1 before scaling leaves inverse(c) in the pivot
                // slot, which is the inverse's entry for this column.
                let scale = gf.inverse(c);
                self.set(icol, icol, 1);
                for v in self.row_mut(icol) {
                    *v = gf.mul(scale, *v);
                }
            }

            id_row[icol] = 1;
            if self.row(icol) != id_row.as_slice() {
                pivot_row.copy_from_slice(self.row(icol));
                for (ix, row) in self.data.chunks_exact_mut(k).enumerate() {
                    if ix != icol {
                        let c = row[icol];
                        row[icol] = 0;
                        gf.add_mul(row, &pivot_row, c);
                    }
                }
            }
            id_row[icol] = 0;
        }

        for col in (0..k).rev() {
            if indxr[col] != indxc[col] {
                for row in 0..k {
                    self.data.swap(row * k + indxr[col], row * k + indxc[col]);
                }
            }
        }
        Ok(())
    }

    fn find_pivot(&self, col: usize, ipiv: &[u8]) -> Result<(usize, usize)> {
        let k = self.rows;
        if ipiv[col] != 1 && self.get(col, col) != 0 {
            return Ok((col, col));
        }
        for row in 0..k {
            if ipiv[row] == 1 {
                continue;
            }
            for ix in 0..k {
                if ipiv[ix] == 0 {
                    if self.get(row, ix) != 0 {
                        return Ok((row, ix));
                    }
                } else if ipiv[ix] > 1 {
                    return Err(ShardweaveError::SingularMatrix);
                }
            }
        }
        Err(ShardweaveError::SingularMatrix)
    }

    /// In-place inversion of a square Vandermonde matrix whose row `i` is
    /// `[1, p_i, p_i^2, ...]`, using synthetic division against the
    /// polynomial `prod(x - p_i)`.
    ///
    /// A 1x1 matrix is left unchanged.
    pub fn invert_vandermonde(&mut self) -> Result<()> {
        if self.rows != self.cols {
            return Err(ShardweaveError::SingularMatrix);
        }
        let k = self.rows;
        if k <= 1 {
            return Ok(());
        }
        let gf = field();

        let p: Vec<u8> = (0..k).map(|i| self.get(i, 1)).collect();

        // Coefficients of prod(x - p_i), leading 1 implied.
        let mut c = vec![0u8; k];
        c[k - 1] = p[0];
        for (i, &p_i) in p.iter().enumerate().skip(1) {
            for j in (k - 1 - i)..(k - 1) {
                c[j] ^= gf.mul(p_i, c[j + 1]);
            }
            c[k - 1] ^= p_i;
        }

        let mut b = vec![0u8; k];
        for (row, &xx) in p.iter().enumerate() {
            let mut t = 1u8;
            b[k - 1] = 1;
            for i in (0..k - 1).rev() {
                b[i] = c[i + 1] ^ gf.mul(xx, b[i + 1]);
                t = gf.mul(xx, t) ^ b[i];
            }
            if t == 0 {
                return Err(ShardweaveError::SingularMatrix);
            }
            let scale = gf.inverse(t);
            for (col, &b_col) in b.iter().enumerate() {
                self.set(col, row, gf.mul(scale, b_col));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix {}x{} [", self.rows, self.cols)?;
        for r in 0..self.rows {
            write!(f, "  ")?;
            for v in self.row(r) {
                write!(f, "{:02x} ", v)?;
            }
            writeln!(f)?;
        }
        write!(f, "]")
    }
}
