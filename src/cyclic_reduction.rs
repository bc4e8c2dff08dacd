// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Cyclic reduction over the positions of a lane-major block.
//!
//! Round `r` (stride `2^r`) eliminates every other remaining unknown, leaving
//! one unknown per lane at vector `N - 1`. Those are coupled across lanes by a
//! recurrence with coefficients `(e_R, f_R)` and are solved with an L-tap lane
//! impulse matrix. Back-substitution then fills in the eliminated positions
//! from the coarsest stride down.
//!
//! The factors divide by `e_r`. Feedback taps that drive some `e_r` with
//! `r < log2(N)` to zero (`a1 == 0` already does) have no reduction and are
//! rejected when the solver is built.

use crate::decomposition::RecurrenceSolver;
use crate::shift_reg::ShiftReg;
use crate::simd::{SimdVector, MAX_LANES};
use crate::ConfigError;

/// Capacity of the per-level factor tables, `log2(N) + 1` levels.
pub const MAX_LEVELS: usize = 16;

/// Cyclic-reduction solver for blocks of `N >= 2` vectors.
#[derive(Clone, Debug)]
pub struct CyclicReduction<V, const N: usize> {
    rounds: usize,
    /// `f_r / e_r` for the forward rounds.
    ratio: [f32; MAX_LEVELS],
    e: [f32; MAX_LEVELS],
    /// Back-substitution weights of the newer and older neighbour, `c_r`
    /// and `d_r`, indexed by the coarser level.
    c: [f32; MAX_LEVELS],
    d: [f32; MAX_LEVELS],
    top_impulse: [V; MAX_LANES],
    top_y2: V,
    top_y1: V,
    coarse: [V; 2],
    /// Lane-0 boundary weights for the first position of each finer round.
    fine: [[V; 2]; MAX_LEVELS],
}

impl<V: SimdVector, const N: usize> CyclicReduction<V, N> {
    /// Precompute the level factors for the feedback taps.
    ///
    /// Only sections build this, after checking `N` is a power of two between
    /// 2 and `2^(MAX_LEVELS - 1)`.
    ///
    /// # Errors
    /// `ConfigError::SingularReduction` when a pivot `e_r` is zero or a factor
    /// is not finite.
    pub(crate) fn new(a1: f32, a2: f32) -> Result<Self, ConfigError> {
        debug_assert!(N >= 2 && N.is_power_of_two());
        let rounds = N.trailing_zeros() as usize;
        debug_assert!(rounds < MAX_LEVELS);

        let mut e = [0.0f64; MAX_LEVELS];
        let mut f = [0.0f64; MAX_LEVELS];
        let mut g = [0.0f64; MAX_LEVELS];
        let mut h = [0.0f64; MAX_LEVELS];
        let mut c = [0.0f64; MAX_LEVELS];
        let mut d = [0.0f64; MAX_LEVELS];
        e[0] = -f64::from(a1);
        f[0] = -f64::from(a2);
        g[0] = e[0];
        h[0] = f[0];
        for r in 1..=rounds {
            if e[r - 1] == 0.0 || !e[r - 1].is_finite() {
                return Err(ConfigError::SingularReduction { level: r - 1 });
            }
            c[r] = e[r - 1] - f[r - 1] / e[r - 1];
            d[r] = -f[r - 1] * f[r - 1] / e[r - 1];
            e[r] = f[r - 1] - e[r - 1] * c[r];
            f[r] = -e[r - 1] * d[r];
            g[r] = f[r - 1] - e[r - 1] * g[r - 1];
            h[r] = -e[r - 1] * h[r - 1];
        }
        for r in 1..=rounds {
            let factors = [e[r], f[r], g[r], h[r], c[r], d[r]];
            if !factors.iter().all(|v| v.is_finite()) {
                return Err(ConfigError::SingularReduction { level: r });
            }
        }
        let mut ratio = [0.0f32; MAX_LEVELS];
        for r in 0..rounds {
            ratio[r] = (f[r] / e[r]) as f32;
        }

        // Lane impulse response of the top-level recurrence.
        let (e_top, f_top, g_top, h_top) = (e[rounds], f[rounds], g[rounds], h[rounds]);
        let mut lane_impulse = [0.0f64; MAX_LANES];
        lane_impulse[0] = 1.0;
        for l in 1..V::LANES {
            let older = if l >= 2 { lane_impulse[l - 2] } else { 0.0 };
            lane_impulse[l] = -e_top * lane_impulse[l - 1] - f_top * older;
        }
        let mut top_impulse = [V::splat(0.0); MAX_LANES];
        for (l, column) in top_impulse.iter_mut().take(V::LANES).enumerate() {
            *column = V::from_fn(|i| if i >= l { lane_impulse[i - l] as f32 } else { 0.0 });
        }
        let top_y2 = V::from_fn(|i| (h_top * lane_impulse[i]) as f32);
        let top_y1 = V::from_fn(|i| match i {
            0 => g_top as f32,
            _ => (g_top * lane_impulse[i] + f_top * lane_impulse[i - 1]) as f32,
        });

        let boundary = |lane0: f64, rest: f64| {
            V::from_fn(move |i| if i == 0 { lane0 as f32 } else { rest as f32 })
        };
        let coarse = [
            boundary(h[rounds - 1], c[rounds]),
            boundary(g[rounds - 1], d[rounds]),
        ];
        let mut fine = [[V::splat(0.0); 2]; MAX_LEVELS];
        for level in 0..rounds.saturating_sub(1) {
            fine[level] = [
                boundary(h[level], d[level + 1]),
                boundary(g[level], c[level + 1]),
            ];
        }

        Ok(CyclicReduction {
            rounds,
            ratio,
            e: e.map(|v| v as f32),
            c: c.map(|v| v as f32),
            d: d.map(|v| v as f32),
            top_impulse,
            top_y2,
            top_y1,
            coarse,
            fine,
        })
    }

    /// Number of reduction rounds, `log2(N)`.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    fn eliminate(&self, block: &mut [V; N]) {
        for level in 0..self.rounds {
            let k = 1 << level;
            let pairs = N / (2 * k);
            let ratio = V::splat(self.ratio[level]);
            let e = V::splat(self.e[level]);

            // The predecessor of lane 0 lies in the previous block and is
            // already eliminated there.
            let carry = block[N - 1].shift_in(0.0);
            block[k - 1] = block[k - 1] - ratio * carry;
            for j in 1..pairs {
                let p = 2 * k * j + k - 1;
                block[p] = block[p] - ratio * block[p - k];
            }
            for j in 0..pairs {
                let p = 2 * k * (j + 1) - 1;
                block[p] = block[p] - e * block[p - k];
            }
        }
    }

    fn solve_top(&self, block: &mut [V; N], yi2: f32, yi1: f32) {
        let top = block[N - 1].to_array();
        let mut y = self.top_y2 * V::splat(-yi2) - self.top_y1 * V::splat(yi1);
        for (column, &x) in self.top_impulse.iter().zip(top.as_ref()) {
            y = column.mul_add(V::splat(x), y);
        }
        block[N - 1] = y;
    }

    fn substitute(&self, block: &mut [V; N], yi2: f32, yi1: f32) {
        let last = block[N - 1];
        let prev1 = last.shift_in(yi1);

        let [w_coarse, w_prev2] = self.coarse;
        let p = N / 2 - 1;
        block[p] = block[p] - w_coarse * last.shift_in(yi2) - w_prev2 * prev1.shift_in(yi1);

        for level in (0..self.rounds.saturating_sub(1)).rev() {
            let k = 2 << level;
            let half = k / 2;
            let c = V::splat(self.c[level + 1]);
            let d = V::splat(self.d[level + 1]);
            let [w_older, w_newer] = self.fine[level];

            let older = block[N - k - 1].shift_in(yi2);
            block[half - 1] = block[half - 1] - w_older * older - w_newer * prev1;
            for j in 1..N / k {
                let p = j * k + half - 1;
                let before = if j == 1 { prev1 } else { block[(j - 1) * k - 1] };
                block[p] = block[p] - c * block[j * k - 1] - d * before;
            }
        }
    }
}

impl<V: SimdVector, const N: usize> RecurrenceSolver<V, N> for CyclicReduction<V, N> {
    #[inline]
    fn solve(&self, block: &mut [V; N], history: &mut ShiftReg<V>) {
        let (yi2, yi1) = (history.get(-2), history.get(-1));
        self.eliminate(block);
        self.solve_top(block, yi2, yi1);
        self.substitute(block, yi2, yi1);
        history.shift(block[N - 2].extract(V::LANES - 1));
        history.shift(block[N - 1].extract(V::LANES - 1));
    }
}
