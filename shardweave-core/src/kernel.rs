//! Multiply-accumulate kernels
//!
//! `dst[i] ^= c * src[i]` underlies every encode and decode step. The
//! portable [`TableKernel`] is always available; [`NibbleKernel`] uses the
//! split-nibble shuffle technique on x86/x86_64 when SSSE3 or AVX2 is
//! detected at runtime. Both produce bit-identical output.

use crate::gf::field;
use std::sync::Arc;

/// Strategy for the buffer-level multiply-accumulate primitive
pub trait MulAddKernel: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// `dst[i] ^= coefficient * src[i]` over the common length of both
    /// slices. A zero coefficient must leave `dst` untouched.
    fn mul_add(&self, dst: &mut [u8], src: &[u8], coefficient: u8);
}

/// Portable per-byte table lookup
#[derive(Debug, Default, Clone, Copy)]
pub struct TableKernel;

impl MulAddKernel for TableKernel {
    fn name(&self) -> &'static str {
        "table"
    }

    fn mul_add(&self, dst: &mut [u8], src: &[u8], coefficient: u8) {
        field().add_mul(dst, src, coefficient);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimdTier {
    Avx2,
    Ssse3,
}

/// Split-nibble shuffle kernel
#[derive(Debug, Clone, Copy)]
pub struct NibbleKernel {
    tier: SimdTier,
}

impl NibbleKernel {
    /// Probe the CPU; `None` when no supported instruction set is present.
    pub fn detect() -> Option<Self> {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if std::is_x86_feature_detected!("avx2") {
                return Some(Self {
                    tier: SimdTier::Avx2,
                });
            }
            if std::is_x86_feature_detected!("ssse3") {
                return Some(Self {
                    tier: SimdTier::Ssse3,
                });
            }
        }
        None
    }
}

impl MulAddKernel for NibbleKernel {
    fn name(&self) -> &'static str {
        match self.tier {
            SimdTier::Avx2 => "nibble-avx2",
            SimdTier::Ssse3 => "nibble-ssse3",
        }
    }

    fn mul_add(&self, dst: &mut [u8], src: &[u8], coefficient: u8) {
        if coefficient == 0 {
            return;
        }
        let len = dst.len().min(src.len());
        let (dst, src) = (&mut dst[..len], &src[..len]);

        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        let done = {
            let (low, high) = field().nibble_tables(coefficient);
            // SAFETY: the tier was selected by runtime feature detection.
            unsafe {
                match self.tier {
                    SimdTier::Avx2 => x86::mul_add_avx2(dst, src, &low, &high),
                    SimdTier::Ssse3 => x86::mul_add_ssse3(dst, src, &low, &high),
                }
            }
        };
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let done = 0;

        field().add_mul(&mut dst[done..], &src[done..], coefficient);
    }
}

/// Fastest kernel available on this machine
pub fn default_kernel() -> Arc<dyn MulAddKernel> {
    #[cfg(feature = "simd")]
    {
        if let Some(kernel) = NibbleKernel::detect() {
            return Arc::new(kernel);
        }
    }
    Arc::new(TableKernel)
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86 {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::*;

    /// Processes whole 16-byte lanes and returns the number of bytes done.
    ///
    /// # Safety
    /// Caller must ensure SSSE3 is available and `dst.len() == src.len()`.
    #[target_feature(enable = "ssse3")]
    pub(super) unsafe fn mul_add_ssse3(
        dst: &mut [u8],
        src: &[u8],
        low: &[u8; 16],
        high: &[u8; 16],
    ) -> usize {
        let low_v = _mm_loadu_si128(low.as_ptr().cast());
        let high_v = _mm_loadu_si128(high.as_ptr().cast());
        let mask = _mm_set1_epi8(0x0f);

        let chunks = dst.len() / 16;
        for i in 0..chunks {
            let offset = i * 16;
            let s = _mm_loadu_si128(src.as_ptr().add(offset).cast());
            let d = _mm_loadu_si128(dst.as_ptr().add(offset).cast());
            let lo = _mm_and_si128(s, mask);
            let hi = _mm_and_si128(_mm_srli_epi64::<4>(s), mask);
            let p = _mm_xor_si128(_mm_shuffle_epi8(low_v, lo), _mm_shuffle_epi8(high_v, hi));
            _mm_storeu_si128(dst.as_mut_ptr().add(offset).cast(), _mm_xor_si128(d, p));
        }
        chunks * 16
    }

    /// Processes whole 32-byte lanes and returns the number of bytes done.
    ///
    /// # Safety
    /// Caller must ensure AVX2 is available and `dst.len() == src.len()`.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn mul_add_avx2(
        dst: &mut [u8],
        src: &[u8],
        low: &[u8; 16],
        high: &[u8; 16],
    ) -> usize {
        let low_v = _mm256_broadcastsi128_si256(_mm_loadu_si128(low.as_ptr().cast()));
        let high_v = _mm256_broadcastsi128_si256(_mm_loadu_si128(high.as_ptr().cast()));
        let mask = _mm256_set1_epi8(0x0f);

        let chunks = dst.len() / 32;
        for i in 0..chunks {
            let offset = i * 32;
            let s = _mm256_loadu_si256(src.as_ptr().add(offset).cast());
            let d = _mm256_loadu_si256(dst.as_ptr().add(offset).cast());
            let lo = _mm256_and_si256(s, mask);
            let hi = _mm256_and_si256(_mm256_srli_epi64::<4>(s), mask);
            let p = _mm256_xor_si256(
                _mm256_shuffle_epi8(low_v, lo),
                _mm256_shuffle_epi8(high_v, hi),
            );
            _mm256_storeu_si256(dst.as_mut_ptr().add(offset).cast(), _mm256_xor_si256(d, p));
        }
        chunks * 32
    }
}
