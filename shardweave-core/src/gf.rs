//! GF(2^8) arithmetic
//!
//! Tables are generated once per process from the primitive polynomial
//! `x^8 + x^4 + x^3 + x^2 + 1` and shared read-only afterwards:
//! - `exp`: power of the primitive element, doubled to 510 entries
//! - `log`: discrete logarithm, with `log[0] = 255` as an out-of-range sentinel
//! - `inverse`: multiplicative inverse (`inverse[0]` is defined as 0)
//! - `mul_table`: full 256x256 product table

use std::sync::OnceLock;

/// Bits per field element
pub const GF_BITS: usize = 8;

/// Number of nonzero field elements (`2^8 - 1`)
pub const GF_SIZE: usize = (1 << GF_BITS) - 1;

/// Coefficients of the primitive polynomial, lowest degree first.
const PRIMITIVE_POLYNOMIAL: &[u8; GF_BITS + 1] = b"101110001";

/// Precomputed GF(2^8) tables
pub struct Field {
    exp: [u8; 2 * GF_SIZE],
    log: [u8; GF_SIZE + 1],
    inverse: [u8; GF_SIZE + 1],
    mul_table: Vec<[u8; GF_SIZE + 1]>,
}

/// Shared process-wide field instance
pub fn field() -> &'static Field {
    static FIELD: OnceLock<Field> = OnceLock::new();
    FIELD.get_or_init(Field::generate)
}

/// Reduce an exponent into `[0, 254]`.
#[inline]
pub fn modnn(mut x: usize) -> usize {
    while x >= GF_SIZE {
        x -= GF_SIZE;
        x = (x >> GF_BITS) + (x & GF_SIZE);
    }
    x
}

impl Field {
    /// Build all tables from the primitive polynomial.
    pub fn generate() -> Self {
        let mut exp = [0u8; 2 * GF_SIZE];
        let mut log = [0u8; GF_SIZE + 1];
        let mut inverse = [0u8; GF_SIZE + 1];

        // First GF_BITS powers are plain shifts; exp[GF_BITS] collects the
        // reduction term x^8 = x^4 + x^3 + x^2 + 1.
        let mut reduction = 0usize;
        let mut mask = 1usize;
        for (i, &coeff) in PRIMITIVE_POLYNOMIAL.iter().take(GF_BITS).enumerate() {
            exp[i] = mask as u8;
            log[mask] = i as u8;
            if coeff == b'1' {
                reduction ^= mask;
            }
            mask <<= 1;
        }
        exp[GF_BITS] = reduction as u8;
        log[reduction] = GF_BITS as u8;

        let high_bit = 1usize << (GF_BITS - 1);
        for i in (GF_BITS + 1)..GF_SIZE {
            let prev = exp[i - 1] as usize;
            let next = if prev >= high_bit {
                reduction ^ ((prev ^ high_bit) << 1)
            } else {
                prev << 1
            };
            exp[i] = next as u8;
            log[next] = i as u8;
        }
        log[0] = GF_SIZE as u8;

        for i in 0..GF_SIZE {
            exp[i + GF_SIZE] = exp[i];
        }

        inverse[0] = 0;
        inverse[1] = 1;
        for x in 2..=GF_SIZE {
            inverse[x] = exp[GF_SIZE - log[x] as usize];
        }

        let mut field = Self {
            exp,
            log,
            inverse,
            mul_table: vec![[0u8; GF_SIZE + 1]; GF_SIZE + 1],
        };
        field.build_mul_table();
        field
    }

    fn build_mul_table(&mut self) {
        for i in 0..=GF_SIZE {
            for j in 0..=GF_SIZE {
                let idx = modnn(self.log[i] as usize + self.log[j] as usize);
                self.mul_table[i][j] = self.exp[idx];
            }
        }
        for j in 0..=GF_SIZE {
            self.mul_table[0][j] = 0;
            self.mul_table[j][0] = 0;
        }
    }

    /// Product of two field elements
    #[inline]
    pub fn mul(&self, x: u8, y: u8) -> u8 {
        self.mul_table[x as usize][y as usize]
    }

    /// Multiplicative inverse (`inverse(0) == 0`)
    #[inline]
    pub fn inverse(&self, x: u8) -> u8 {
        self.inverse[x as usize]
    }

    /// Primitive element raised to `power`
    #[inline]
    pub fn exp(&self, power: usize) -> u8 {
        self.exp[modnn(power)]
    }

    /// Discrete logarithm; 255 for zero
    #[inline]
    pub fn log(&self, x: u8) -> u8 {
        self.log[x as usize]
    }

    /// Row of the product table for a fixed coefficient
    #[inline]
    pub fn mul_row(&self, coefficient: u8) -> &[u8; GF_SIZE + 1] {
        &self.mul_table[coefficient as usize]
    }

    /// Split-nibble product tables for `coefficient`:
    /// `low[i] = c * i` and `high[i] = c * (i << 4)`.
    pub fn nibble_tables(&self, coefficient: u8) -> ([u8; 16], [u8; 16]) {
        let row = self.mul_row(coefficient);
        let mut low = [0u8; 16];
        let mut high = [0u8; 16];
        for i in 0..16 {
            low[i] = row[i];
            high[i] = row[i << 4];
        }
        (low, high)
    }

    /// Portable multiply-accumulate: `dst[i] ^= coefficient * src[i]`.
    ///
    /// A zero coefficient leaves `dst` untouched.
    pub fn add_mul(&self, dst: &mut [u8], src: &[u8], coefficient: u8) {
        match coefficient {
            0 => {}
            1 => {
                for (d, &s) in dst.iter_mut().zip(src.iter()) {
                    *d ^= s;
                }
            }
            c => {
                let row = self.mul_row(c);
                for (d, &s) in dst.iter_mut().zip(src.iter()) {
                    *d ^= row[s as usize];
                }
            }
        }
    }
}
