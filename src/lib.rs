// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![no_std]
#![warn(missing_docs)]
//! Block-parallel SIMD evaluation of cascaded second-order IIR sections.
//!
//! A section computes
//! `y[n] = x[n] + b1*x[n-1] + b2*x[n-2] + a1*y[n-1] + a2*y[n-2]`.
//! Blocks of `N` vectors of `L` lanes are transposed so every lane owns a
//! contiguous run of samples, filtered in parallel, and stitched back
//! together by one of three solvers:
//!
//! - recursive doubling (particular/homogeneous split plus a log2(L) lane
//!   scan), the default for `N >= 2`;
//! - cyclic reduction over log2(N) rounds;
//! - a precomputed impulse matrix for `N = 1`.
//!
//! All of them agree with the serial recurrence in [`reference`] up to
//! rounding.
//!
//! ## Feature flags
//! - `std` (default): CPU feature detection for [`LaneWidth::detect`] and
//!   `std::error::Error` for [`ConfigError`]. Implies `alloc`.
//! - `alloc`: runtime-length cascades (`Vec` of sections) and the
//!   [`dispatch`] table.

#[cfg(all(feature = "alloc", not(feature = "std")))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;
#[cfg(all(feature = "alloc", feature = "std"))]
extern crate std as alloc;

pub mod block_filter;
pub mod cascade;
pub mod cyclic_reduction;
pub mod decomposition;
#[cfg(feature = "alloc")]
pub mod dispatch;
/// Feed-forward taps across lane boundaries.
pub mod fir_core;
pub mod reference;
/// Filter sections, their taps and histories.
pub mod section;
/// Depth-limited scalar history.
pub mod shift_reg;
pub mod simd;
pub mod transpose;

use core::fmt;

pub use self::cascade::{Cascade, Filter};
#[cfg(feature = "alloc")]
pub use self::dispatch::{FilterConfig, SampleFilter};
pub use self::section::{Coefficients, InitialConditions, Section, SolverKind, Stage};
pub use self::simd::{LaneWidth, SimdVector};

/// Error returned when a filter configuration is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Lane count is not 4, 8 or 16.
    UnsupportedLaneWidth(usize),
    /// Vectors per block has no compiled variant.
    UnsupportedBlockVectors(usize),
    /// Algorithm does not run on this many vectors per block.
    SolverShape {
        /// Requested algorithm.
        solver: SolverKind,
        /// Vectors per block.
        vectors: usize,
    },
    /// Feedback taps leave cyclic reduction without a usable pivot.
    SingularReduction {
        /// Reduction level whose factors broke down.
        level: usize,
    },
    /// Tap and initial-condition arrays differ in count.
    CascadeLength {
        /// Number of tap arrays.
        taps: usize,
        /// Number of initial-condition arrays.
        initial: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnsupportedLaneWidth(lanes) => {
                write!(f, "unsupported lane width {} (expected 4, 8 or 16)", lanes)
            }
            ConfigError::UnsupportedBlockVectors(vectors) => {
                write!(f, "unsupported block shape of {} vectors", vectors)
            }
            ConfigError::SolverShape { solver, vectors } => {
                write!(f, "{} solver cannot run on {} vectors per block", solver, vectors)
            }
            ConfigError::SingularReduction { level } => write!(
                f,
                "cyclic reduction pivot at level {} is zero or not finite",
                level
            ),
            ConfigError::CascadeLength { taps, initial } => write!(
                f,
                "{} tap arrays but {} initial-condition arrays",
                taps, initial
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
