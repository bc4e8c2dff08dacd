// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Particular/homogeneous split of the all-pole recurrence with a
//! recursive-doubling scan across lanes.
//!
//! Each lane first runs `w[n] = v[n] + a1*w[n-1] + a2*w[n-2]` as if its
//! history were zero. The true output differs from `w` by a homogeneous term
//! driven by the two outputs preceding the lane's run:
//!
//! ```text
//! y[n] = w[n] + h2[n]*y[-2] + h1[n]*y[-1]
//! ```
//!
//! The trailing pair of each lane therefore obeys a 2x2 recurrence across
//! lanes, `s[l] = w_tail[l] + M s[l-1]`, which a log2(L) prefix scan solves.

use crate::shift_reg::ShiftReg;
use crate::simd::{SimdVector, MAX_LANES};

/// Largest number of scan stages, log2 of [`MAX_LANES`].
pub const MAX_STAGES: usize = 4;

/// Solves the all-pole half of a section on a lane-major block.
///
/// The block holds the feed-forward output on entry and the section output
/// on return; `history` holds `y[-2], y[-1]` and is advanced by the block's
/// trailing two outputs.
pub trait RecurrenceSolver<V: SimdVector, const N: usize> {
    /// Solve one block in place.
    fn solve(&self, block: &mut [V; N], history: &mut ShiftReg<V>);
}

/// 2x2 matrix acting on `(y2, y1)` column pairs.
#[derive(Clone, Copy, Debug)]
struct Mat2 {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl Mat2 {
    const ZERO: Mat2 = Mat2 {
        a: 0.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
    };

    /// `self * rhs`.
    fn product(self, rhs: Mat2) -> Mat2 {
        Mat2 {
            a: self.a * rhs.a + self.b * rhs.c,
            b: self.a * rhs.b + self.b * rhs.d,
            c: self.c * rhs.a + self.d * rhs.c,
            d: self.c * rhs.b + self.d * rhs.d,
        }
    }
}

/// Per-lane scan factors, one vector per matrix entry. Lanes mapped to
/// `None` get zero.
fn factor_vectors<V: SimdVector>(lanes: impl Fn(usize) -> Option<Mat2>) -> [V; 4] {
    let entry = |pick: fn(&Mat2) -> f64| {
        V::from_fn(|l| lanes(l).as_ref().map_or(0.0, pick) as f32)
    };
    [entry(|m| m.a), entry(|m| m.b), entry(|m| m.c), entry(|m| m.d)]
}

/// Recursive-doubling solver for blocks of `N >= 2` vectors.
#[derive(Clone, Debug)]
pub struct RecursiveDoubling<V, const N: usize> {
    a1: V,
    a2: V,
    /// Weight of `y[-1]` at position `n` of a lane.
    h1: [f32; N],
    /// Weight of `y[-2]` at position `n` of a lane.
    h2: [f32; N],
    /// Folds the output history into lane 0.
    seed: [V; 4],
    stages: [[V; 4]; MAX_STAGES],
}

impl<V: SimdVector, const N: usize> RecursiveDoubling<V, N> {
    /// Precompute gains and scan factors for the feedback taps.
    ///
    /// Only sections build this, after checking `N >= 2`.
    pub(crate) fn new(a1: f32, a2: f32) -> Self {
        debug_assert!(N >= 2);
        let (a1d, a2d) = (f64::from(a1), f64::from(a2));

        // Homogeneous gains from the all-pole impulse response h0.
        let mut h1 = [0.0f64; N];
        let mut h2 = [0.0f64; N];
        let (mut cur, mut next) = (1.0f64, a1d);
        for n in 0..N {
            h1[n] = next;
            h2[n] = a2d * cur;
            let following = a1d * next + a2d * cur;
            cur = next;
            next = following;
        }

        let step = Mat2 {
            a: h2[N - 2],
            b: h1[N - 2],
            c: h2[N - 1],
            d: h1[N - 1],
        };
        let mut powers = [Mat2::ZERO; MAX_LANES];
        powers[0] = step;
        for j in 1..V::LANES {
            powers[j] = step.product(powers[j - 1]);
        }

        let seed = factor_vectors::<V>(|l| (l == 0).then_some(step));
        let mut stages = [[V::splat(0.0); 4]; MAX_STAGES];
        let mut half = 1;
        for stage in stages.iter_mut().take(V::LANES.trailing_zeros() as usize) {
            *stage = factor_vectors::<V>(|l| (l & half != 0).then(|| powers[l & (half - 1)]));
            half *= 2;
        }

        RecursiveDoubling {
            a1: V::splat(a1),
            a2: V::splat(a2),
            h1: h1.map(|g| g as f32),
            h2: h2.map(|g| g as f32),
            seed,
            stages,
        }
    }
}

impl<V: SimdVector, const N: usize> RecurrenceSolver<V, N> for RecursiveDoubling<V, N> {
    #[inline]
    fn solve(&self, block: &mut [V; N], history: &mut ShiftReg<V>) {
        // Particular solution, zero history in every lane.
        block[1] = block[0].mul_add(self.a1, block[1]);
        for n in 2..N {
            block[n] = block[n - 2].mul_add(self.a2, block[n - 1].mul_add(self.a1, block[n]));
        }

        let (yi2, yi1) = (history.get(-2), history.get(-1));
        let (s2, s1) = (V::splat(yi2), V::splat(yi1));
        let [sa, sb, sc, sd] = self.seed;
        let mut y2 = sa.mul_add(s2, sb.mul_add(s1, block[N - 2]));
        let mut y1 = sc.mul_add(s2, sd.mul_add(s1, block[N - 1]));

        for (pattern, [fa, fb, fc, fd]) in V::tables().doubling.iter().zip(&self.stages) {
            let t2 = y2.permute(pattern);
            let t1 = y1.permute(pattern);
            y2 = fa.mul_add(t2, fb.mul_add(t1, y2));
            y1 = fc.mul_add(t2, fd.mul_add(t1, y1));
        }

        // Homogeneous correction from the solved trailing pair of the
        // previous lane.
        let prev2 = y2.shift_in(yi2);
        let prev1 = y1.shift_in(yi1);
        for n in 0..N - 2 {
            block[n] = prev2.mul_add(
                V::splat(self.h2[n]),
                prev1.mul_add(V::splat(self.h1[n]), block[n]),
            );
        }
        block[N - 2] = y2;
        block[N - 1] = y1;

        history.shift(y2.extract(V::LANES - 1));
        history.shift(y1.extract(V::LANES - 1));
    }
}
