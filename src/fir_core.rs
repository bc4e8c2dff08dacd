// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::shift_reg::ShiftReg;
use crate::simd::SimdVector;

/// Feed-forward half of a section: `v[n] = x[n] + b1*x[n-1] + b2*x[n-2]`.
///
/// Runs on lane-major blocks. The two samples preceding a lane's run are the
/// last two vectors of the previous lane; lane 0 reads the input history.
#[derive(Clone, Copy, Debug)]
pub struct FirCore<V> {
    b1: V,
    b2: V,
}

impl<V: SimdVector> FirCore<V> {
    /// Core for the given feed-forward taps.
    pub fn new(b1: f32, b2: f32) -> Self {
        FirCore {
            b1: V::splat(b1),
            b2: V::splat(b2),
        }
    }

    /// Filter a lane-major block in place and advance `history` by the
    /// block's trailing two inputs. `N` must be at least 2.
    #[inline]
    pub fn apply<const N: usize>(&self, block: &mut [V; N], history: &mut ShiftReg<V>) {
        debug_assert!(N >= 2);
        let tail2 = block[N - 2];
        let tail1 = block[N - 1];
        let xi2 = tail2.shift_in(history.get(-2));
        let xi1 = tail1.shift_in(history.get(-1));

        // Walk down so every read sees unfiltered input.
        for n in (2..N).rev() {
            block[n] = block[n - 2].mul_add(self.b2, block[n - 1].mul_add(self.b1, block[n]));
        }
        let x0 = block[0];
        block[1] = xi1.mul_add(self.b2, x0.mul_add(self.b1, block[1]));
        block[0] = xi2.mul_add(self.b2, xi1.mul_add(self.b1, x0));

        history.shift(tail2.extract(V::LANES - 1));
        history.shift(tail1.extract(V::LANES - 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpose::{detranspose, transpose};
    use wide::f32x4;

    #[test]
    fn matches_direct_difference() {
        let (b1, b2) = (1.0, 2.0);
        let fir = FirCore::<f32x4>::new(b1, b2);
        let mut history = ShiftReg::primed(1.0, 2.0);
        let mut block: [f32x4; 4] =
            core::array::from_fn(|n| <f32x4 as SimdVector>::from_fn(|l| (n * 4 + l) as f32));
        transpose(&mut block);
        fir.apply(&mut block, &mut history);
        detranspose(&mut block);

        let mut prev = [1.0f32, 2.0];
        for i in 0..16 {
            let x = i as f32;
            let expected = x + b1 * prev[1] + b2 * prev[0];
            assert_eq!(block[i / 4].extract(i % 4), expected, "sample {}", i);
            prev = [prev[1], x];
        }
        assert_eq!(history.get(-2), 14.0);
        assert_eq!(history.get(-1), 15.0);
    }
}
