// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::simd::SimdVector;

/// Scalar history held in the lanes of one vector, oldest first.
///
/// Only the two newest values are read by the solvers; the matrix solver
/// replaces the whole buffer with a block at once.
#[derive(Clone, Copy, Debug)]
pub struct ShiftReg<V> {
    buf: V,
}

impl<V: SimdVector> ShiftReg<V> {
    /// All-zero history.
    pub fn new() -> Self {
        ShiftReg {
            buf: V::splat(0.0),
        }
    }

    /// History after shifting in `older` and then `newer`.
    pub fn primed(older: f32, newer: f32) -> Self {
        let mut reg = Self::new();
        reg.shift(older);
        reg.shift(newer);
        reg
    }

    /// Append one value, dropping the oldest.
    #[inline]
    pub fn shift(&mut self, value: f32) {
        let mut lanes = self.buf.to_array();
        let lanes_mut = lanes.as_mut();
        lanes_mut.copy_within(1.., 0);
        lanes_mut[V::LANES - 1] = value;
        self.buf = V::from_array(lanes);
    }

    /// Replace the whole buffer.
    #[inline]
    pub fn load(&mut self, values: V) {
        self.buf = values;
    }

    /// Negative offsets count back from the newest value (`-1` is newest),
    /// non-negative ones index from the front.
    #[inline]
    pub fn get(&self, offset: isize) -> f32 {
        let idx = if offset < 0 {
            V::LANES as isize + offset
        } else {
            offset
        };
        self.buf.extract(idx as usize)
    }

    /// Raw buffer.
    #[inline]
    pub fn as_vector(&self) -> V {
        self.buf
    }

    /// Zero the history.
    pub fn reset(&mut self) {
        self.buf = V::splat(0.0);
    }
}

impl<V: SimdVector> Default for ShiftReg<V> {
    fn default() -> Self {
        Self::new()
    }
}
