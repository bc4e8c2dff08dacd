// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Block-major <-> lane-major layout conversion.
//!
//! In block-major order vector `n`, lane `l` holds sample `n * L + l`; in
//! lane-major order it holds sample `l * N + n`, so each lane owns a
//! contiguous run of `N` samples. The conversion is a butterfly of
//! `log2(L)` blend stages.

use crate::simd::SimdVector;

/// Convert a block-major block to lane-major order in place.
#[inline]
pub fn transpose<V: SimdVector, const N: usize>(block: &mut [V; N]) {
    if N < 2 {
        return;
    }
    let half = N / 2;
    for [lo, hi] in V::tables().transpose {
        let cur = *block;
        for n in 0..half {
            let (a, b) = (cur[n], cur[n + half]);
            block[2 * n] = V::blend(a, b, lo);
            block[2 * n + 1] = V::blend(a, b, hi);
        }
    }
}

/// Inverse of [`transpose`].
#[inline]
pub fn detranspose<V: SimdVector, const N: usize>(block: &mut [V; N]) {
    if N < 2 {
        return;
    }
    let half = N / 2;
    for [lo, hi] in V::tables().transpose.iter().rev() {
        let cur = *block;
        for n in 0..half {
            let (a, b) = (cur[2 * n], cur[2 * n + 1]);
            block[n] = V::blend(a, b, lo);
            block[n + half] = V::blend(a, b, hi);
        }
    }
}
