// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Direct solver for one vector at a time: the full biquad written as a
//! lower-triangular L x L impulse matrix plus four history carry vectors.

use crate::shift_reg::ShiftReg;
use crate::simd::{SimdVector, MAX_LANES};

/// `v[0] = first`, `v[1] = second`, then the all-pole recurrence.
fn all_pole_run(first: f64, second: f64, a1: f64, a2: f64) -> [f64; MAX_LANES + 1] {
    let mut out = [0.0; MAX_LANES + 1];
    out[0] = first;
    out[1] = second;
    for k in 2..out.len() {
        out[k] = a1 * out[k - 1] + a2 * out[k - 2];
    }
    out
}

/// Precomputed matrix solver for natural-layout vectors.
#[derive(Clone, Debug)]
pub struct BlockMatrix<V> {
    /// Column `l`: response of the vector to a unit input at lane `l`.
    impulse: [V; MAX_LANES],
    /// Response to `x[-1]`.
    p1: V,
    /// Response to `x[-2]`.
    p2: V,
    /// Response to `y[-1]`.
    h1: V,
    /// Response to `y[-2]`.
    h2: V,
}

impl<V: SimdVector> BlockMatrix<V> {
    /// Precompute the matrix for the four taps.
    pub fn new(b1: f32, b2: f32, a1: f32, a2: f32) -> Self {
        let [b1, b2, a1, a2] = [b1, b2, a1, a2].map(f64::from);
        let h0 = all_pole_run(1.0, a1, a1, a2);
        let p1 = all_pole_run(b1, a1 * b1 + b2, a1, a2);
        let p2 = all_pole_run(b2, a1 * b2, a1, a2);

        let mut response = [0.0f64; MAX_LANES];
        response[0] = 1.0;
        for k in 1..MAX_LANES {
            response[k] = h0[k] + p1[k - 1];
        }
        let mut impulse = [V::splat(0.0); MAX_LANES];
        for (l, column) in impulse.iter_mut().take(V::LANES).enumerate() {
            *column = V::from_fn(|i| if i >= l { response[i - l] as f32 } else { 0.0 });
        }

        BlockMatrix {
            impulse,
            p1: V::from_fn(|i| p1[i] as f32),
            p2: V::from_fn(|i| p2[i] as f32),
            h1: V::from_fn(|i| h0[i + 1] as f32),
            h2: V::from_fn(|i| (a2 * h0[i]) as f32),
        }
    }

    /// Filter one vector of consecutive samples, then load it and its
    /// output as the new histories.
    #[inline]
    pub fn apply(&self, x: V, x_hist: &mut ShiftReg<V>, y_hist: &mut ShiftReg<V>) -> V {
        let mut y = self.p2 * V::splat(x_hist.get(-2));
        y = self.p1.mul_add(V::splat(x_hist.get(-1)), y);
        y = self.h2.mul_add(V::splat(y_hist.get(-2)), y);
        y = self.h1.mul_add(V::splat(y_hist.get(-1)), y);
        let lanes = x.to_array();
        for (column, &sample) in self.impulse.iter().zip(lanes.as_ref()) {
            y = column.mul_add(V::splat(sample), y);
        }
        x_hist.load(x);
        y_hist.load(y);
        y
    }
}
