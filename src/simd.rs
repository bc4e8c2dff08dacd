// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Vector abstraction over the supported SIMD widths.
//!
//! Every solver is written once against [`SimdVector`]; the `wide` types
//! `f32x4`, `f32x8` and `f32x16` implement it, each carrying its own constant
//! permutation tables.

use core::fmt::Debug;
use core::ops::{Add, Mul, Sub};

use wide::{f32x16, f32x4, f32x8};

use crate::ConfigError;

/// Supported number of lanes per vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LaneWidth {
    /// 4 lanes (SSE, NEON).
    #[default]
    X4,
    /// 8 lanes (AVX/AVX2).
    X8,
    /// 16 lanes (AVX-512).
    X16,
}

impl LaneWidth {
    /// Number of `f32` lanes.
    pub const fn lanes(self) -> usize {
        match self {
            LaneWidth::X4 => 4,
            LaneWidth::X8 => 8,
            LaneWidth::X16 => 16,
        }
    }

    /// Map a lane count to a supported width.
    ///
    /// # Errors
    /// Returns `ConfigError::UnsupportedLaneWidth` for anything but 4, 8 or 16.
    pub const fn from_lanes(lanes: usize) -> Result<Self, ConfigError> {
        match lanes {
            4 => Ok(LaneWidth::X4),
            8 => Ok(LaneWidth::X8),
            16 => Ok(LaneWidth::X16),
            other => Err(ConfigError::UnsupportedLaneWidth(other)),
        }
    }

    /// Widest vector the running CPU executes natively.
    #[cfg(feature = "std")]
    pub fn detect() -> Self {
        let width = Self::detect_native();
        log::trace!("detected native vector width {:?}", width);
        width
    }

    #[cfg(feature = "std")]
    fn detect_native() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("avx512f") {
                return LaneWidth::X16;
            }
            if std::is_x86_feature_detected!("avx") {
                return LaneWidth::X8;
            }
        }
        LaneWidth::X4
    }
}

/// Constant lane permutations of one vector width.
#[derive(Debug)]
pub struct LaneTables {
    /// Blend pattern pair per transpose stage, widest chunk first. Indices
    /// below the lane count select from the first operand, the rest from the
    /// second.
    pub transpose: &'static [[&'static [u8]; 2]],
    /// Source lane per recursive-doubling stage; `-1` selects zero.
    pub doubling: &'static [&'static [i8]],
}

static TABLES_X4: LaneTables = LaneTables {
    transpose: &[
        [&[0, 1, 4, 5], &[2, 3, 6, 7]],
        [&[0, 4, 2, 6], &[1, 5, 3, 7]],
    ],
    doubling: &[&[-1, 0, -1, 2], &[-1, -1, 1, 1]],
};

static TABLES_X8: LaneTables = LaneTables {
    transpose: &[
        [&[0, 1, 2, 3, 8, 9, 10, 11], &[4, 5, 6, 7, 12, 13, 14, 15]],
        [&[0, 1, 8, 9, 4, 5, 12, 13], &[2, 3, 10, 11, 6, 7, 14, 15]],
        [&[0, 8, 2, 10, 4, 12, 6, 14], &[1, 9, 3, 11, 5, 13, 7, 15]],
    ],
    doubling: &[
        &[-1, 0, -1, 2, -1, 4, -1, 6],
        &[-1, -1, 1, 1, -1, -1, 5, 5],
        &[-1, -1, -1, -1, 3, 3, 3, 3],
    ],
};

#[rustfmt::skip]
static TABLES_X16: LaneTables = LaneTables {
    transpose: &[
        [
            &[0, 1, 2, 3, 4, 5, 6, 7, 16, 17, 18, 19, 20, 21, 22, 23],
            &[8, 9, 10, 11, 12, 13, 14, 15, 24, 25, 26, 27, 28, 29, 30, 31],
        ],
        [
            &[0, 1, 2, 3, 16, 17, 18, 19, 8, 9, 10, 11, 24, 25, 26, 27],
            &[4, 5, 6, 7, 20, 21, 22, 23, 12, 13, 14, 15, 28, 29, 30, 31],
        ],
        [
            &[0, 1, 16, 17, 4, 5, 20, 21, 8, 9, 24, 25, 12, 13, 28, 29],
            &[2, 3, 18, 19, 6, 7, 22, 23, 10, 11, 26, 27, 14, 15, 30, 31],
        ],
        [
            &[0, 16, 2, 18, 4, 20, 6, 22, 8, 24, 10, 26, 12, 28, 14, 30],
            &[1, 17, 3, 19, 5, 21, 7, 23, 9, 25, 11, 27, 13, 29, 15, 31],
        ],
    ],
    doubling: &[
        &[-1, 0, -1, 2, -1, 4, -1, 6, -1, 8, -1, 10, -1, 12, -1, 14],
        &[-1, -1, 1, 1, -1, -1, 5, 5, -1, -1, 9, 9, -1, -1, 13, 13],
        &[-1, -1, -1, -1, 3, 3, 3, 3, -1, -1, -1, -1, 11, 11, 11, 11],
        &[-1, -1, -1, -1, -1, -1, -1, -1, 7, 7, 7, 7, 7, 7, 7, 7],
    ],
};

/// Largest supported lane count.
pub const MAX_LANES: usize = 16;

/// A vector of `f32` lanes with the operations the block solvers need.
///
/// Lane shuffles go through the lane array; LLVM lowers the constant-pattern
/// cases to blends and permutes.
pub trait SimdVector:
    Copy
    + Debug
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
{
    /// Number of lanes.
    const LANES: usize;
    /// Width key of this vector type.
    const WIDTH: LaneWidth;

    /// Plain lane array, `[f32; LANES]`.
    type Array: Copy + AsRef<[f32]> + AsMut<[f32]>;

    /// Broadcast one value to every lane.
    fn splat(value: f32) -> Self;
    /// Build from a lane array.
    fn from_array(lanes: Self::Array) -> Self;
    /// Copy out the lanes.
    fn to_array(self) -> Self::Array;
    /// Permutation tables of this width.
    fn tables() -> &'static LaneTables;

    /// `self * m + a`, fused where the backend supports it.
    fn mul_add(self, m: Self, a: Self) -> Self;

    /// Build lane by lane from `f(lane)`.
    #[inline]
    fn from_fn(mut f: impl FnMut(usize) -> f32) -> Self {
        let mut lanes = Self::zero_array();
        for (i, lane) in lanes.as_mut().iter_mut().enumerate() {
            *lane = f(i);
        }
        Self::from_array(lanes)
    }

    /// All-zero lane array.
    #[inline(always)]
    fn zero_array() -> Self::Array {
        Self::splat(0.0).to_array()
    }

    /// Load `LANES` values from the front of `src`.
    #[inline]
    fn from_slice(src: &[f32]) -> Self {
        let mut lanes = Self::zero_array();
        lanes.as_mut().copy_from_slice(&src[..Self::LANES]);
        Self::from_array(lanes)
    }

    /// Store the lanes to the front of `dst`.
    #[inline]
    fn write_to_slice(self, dst: &mut [f32]) {
        dst[..Self::LANES].copy_from_slice(self.to_array().as_ref());
    }

    /// Read one lane.
    #[inline(always)]
    fn extract(self, lane: usize) -> f32 {
        self.to_array().as_ref()[lane]
    }

    /// Select lanes from the concatenation `[a, b]`.
    #[inline]
    fn blend(a: Self, b: Self, pattern: &[u8]) -> Self {
        let (a, b) = (a.to_array(), b.to_array());
        let (a, b) = (a.as_ref(), b.as_ref());
        let mut out = Self::zero_array();
        for (dst, &idx) in out.as_mut().iter_mut().zip(pattern) {
            let idx = idx as usize;
            *dst = if idx < Self::LANES {
                a[idx]
            } else {
                b[idx - Self::LANES]
            };
        }
        Self::from_array(out)
    }

    /// Select lanes of `self`; a negative index yields zero.
    #[inline]
    fn permute(self, pattern: &[i8]) -> Self {
        let src = self.to_array();
        let src = src.as_ref();
        let mut out = Self::zero_array();
        for (dst, &idx) in out.as_mut().iter_mut().zip(pattern) {
            if idx >= 0 {
                *dst = src[idx as usize];
            }
        }
        Self::from_array(out)
    }

    /// Move every lane up by one, dropping the top lane and inserting
    /// `first` at lane 0.
    #[inline]
    fn shift_in(self, first: f32) -> Self {
        let src = self.to_array();
        let mut out = Self::zero_array();
        let dst = out.as_mut();
        dst[0] = first;
        dst[1..].copy_from_slice(&src.as_ref()[..Self::LANES - 1]);
        Self::from_array(out)
    }
}

impl SimdVector for f32x4 {
    const LANES: usize = 4;
    const WIDTH: LaneWidth = LaneWidth::X4;
    type Array = [f32; 4];

    #[inline(always)]
    fn splat(value: f32) -> Self {
        f32x4::splat(value)
    }

    #[inline(always)]
    fn from_array(lanes: [f32; 4]) -> Self {
        f32x4::new(lanes)
    }

    #[inline(always)]
    fn to_array(self) -> [f32; 4] {
        f32x4::to_array(self)
    }

    #[inline(always)]
    fn tables() -> &'static LaneTables {
        &TABLES_X4
    }

    #[inline(always)]
    fn mul_add(self, m: Self, a: Self) -> Self {
        f32x4::mul_add(self, m, a)
    }
}

impl SimdVector for f32x8 {
    const LANES: usize = 8;
    const WIDTH: LaneWidth = LaneWidth::X8;
    type Array = [f32; 8];

    #[inline(always)]
    fn splat(value: f32) -> Self {
        f32x8::splat(value)
    }

    #[inline(always)]
    fn from_array(lanes: [f32; 8]) -> Self {
        f32x8::new(lanes)
    }

    #[inline(always)]
    fn to_array(self) -> [f32; 8] {
        f32x8::to_array(self)
    }

    #[inline(always)]
    fn tables() -> &'static LaneTables {
        &TABLES_X8
    }

    #[inline(always)]
    fn mul_add(self, m: Self, a: Self) -> Self {
        f32x8::mul_add(self, m, a)
    }
}

impl SimdVector for f32x16 {
    const LANES: usize = 16;
    const WIDTH: LaneWidth = LaneWidth::X16;
    type Array = [f32; 16];

    #[inline(always)]
    fn splat(value: f32) -> Self {
        f32x16::splat(value)
    }

    #[inline(always)]
    fn from_array(lanes: [f32; 16]) -> Self {
        f32x16::new(lanes)
    }

    #[inline(always)]
    fn to_array(self) -> [f32; 16] {
        f32x16::to_array(self)
    }

    #[inline(always)]
    fn tables() -> &'static LaneTables {
        &TABLES_X16
    }

    #[inline(always)]
    fn mul_add(self, m: Self, a: Self) -> Self {
        f32x16::mul_add(self, m, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp<V: SimdVector>(offset: f32) -> V {
        V::from_fn(|i| offset + i as f32)
    }

    /// Stage counts follow log2 of the lane count.
    fn check_table_shape<V: SimdVector>() {
        let stages = V::LANES.trailing_zeros() as usize;
        let tables = V::tables();
        assert_eq!(tables.transpose.len(), stages);
        assert_eq!(tables.doubling.len(), stages);
        for [lo, hi] in tables.transpose {
            assert_eq!(lo.len(), V::LANES);
            assert_eq!(hi.len(), V::LANES);
        }
    }

    /// Doubling stage k copies the last lane of each lower half-group into
    /// the upper half.
    fn check_doubling_sources<V: SimdVector>() {
        for (stage, pattern) in V::tables().doubling.iter().enumerate() {
            let half = 1usize << stage;
            for (lane, &src) in pattern.iter().enumerate() {
                let expected = if lane & half != 0 {
                    ((lane & !(2 * half - 1)) + half - 1) as i8
                } else {
                    -1
                };
                assert_eq!(src, expected, "stage {} lane {}", stage, lane);
            }
        }
    }

    #[test]
    fn table_shapes() {
        check_table_shape::<f32x4>();
        check_table_shape::<f32x8>();
        check_table_shape::<f32x16>();
    }

    #[test]
    fn doubling_tables_match_scan_structure() {
        check_doubling_sources::<f32x4>();
        check_doubling_sources::<f32x8>();
        check_doubling_sources::<f32x16>();
    }

    #[test]
    fn shift_in_moves_lanes_up() {
        let v: f32x8 = ramp(1.0);
        let shifted = v.shift_in(-7.0).to_array();
        assert_eq!(shifted, [-7.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn permute_zeroes_negative_lanes() {
        let v: f32x4 = ramp(10.0);
        let out = v.permute(&[-1, 0, -1, 2]).to_array();
        assert_eq!(out, [0.0, 10.0, 0.0, 12.0]);
    }

    #[test]
    fn blend_reads_both_operands() {
        let a: f32x4 = ramp(0.0);
        let b: f32x4 = ramp(100.0);
        let out = <f32x4 as SimdVector>::blend(a, b, &[0, 4, 2, 6]).to_array();
        assert_eq!(out, [0.0, 100.0, 2.0, 102.0]);
    }

    #[test]
    fn wide16_lanes_and_fused_multiply() {
        let v: f32x16 = ramp(0.0);
        let lanes = v.to_array();
        for (i, &x) in lanes.iter().enumerate() {
            assert_eq!(x, i as f32);
        }
        let out = SimdVector::mul_add(v, f32x16::splat(2.0), f32x16::splat(1.0));
        assert_eq!(out.extract(15), 31.0);
        assert_eq!(<f32x16 as SimdVector>::from_slice(&lanes).to_array(), lanes);
    }

    #[test]
    fn lane_width_round_trip() {
        for width in [LaneWidth::X4, LaneWidth::X8, LaneWidth::X16] {
            assert_eq!(LaneWidth::from_lanes(width.lanes()), Ok(width));
        }
        assert_eq!(
            LaneWidth::from_lanes(6),
            Err(ConfigError::UnsupportedLaneWidth(6))
        );
    }
}
