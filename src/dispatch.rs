// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Runtime selection of vector width, block shape and algorithm.

use alloc::boxed::Box;
use alloc::vec::Vec;

use wide::{f32x16, f32x4, f32x8};

use crate::cascade::Filter;
use crate::section::{Coefficients, InitialConditions, Section, SolverKind};
use crate::simd::{LaneWidth, SimdVector};
use crate::ConfigError;

/// Default vectors per block.
pub const DEFAULT_VECTORS: usize = 4;

/// Block shapes with a compiled variant.
pub const SUPPORTED_VECTORS: [usize; 5] = [1, 2, 4, 8, 16];

/// Cascade of sections behind a runtime-chosen width and block shape.
pub trait SampleFilter: Send {
    /// Filter `min(input.len(), output.len())` samples. Returns the number
    /// written.
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> usize;
    /// Filter `buf` in place. Returns its length.
    fn process_in_place(&mut self, buf: &mut [f32]) -> usize;
    /// Zero every section's history.
    fn reset(&mut self);
    /// Histories of every section, first section first.
    fn state(&self) -> Vec<InitialConditions>;
    /// Vector width in use.
    fn lanes(&self) -> LaneWidth;
    /// Vectors per block.
    fn vectors(&self) -> usize;
    /// Samples per block.
    fn block_len(&self) -> usize {
        self.lanes().lanes() * self.vectors()
    }
}

impl<V: SimdVector, const N: usize> SampleFilter for Filter<V, Vec<Section<V, N>>, N> {
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        Filter::process(self, input, output)
    }

    fn process_in_place(&mut self, buf: &mut [f32]) -> usize {
        Filter::process_in_place(self, buf)
    }

    fn reset(&mut self) {
        Filter::reset(self);
    }

    fn state(&self) -> Vec<InitialConditions> {
        self.stage().iter().map(Section::state).collect()
    }

    fn lanes(&self) -> LaneWidth {
        V::WIDTH
    }

    fn vectors(&self) -> usize {
        N
    }
}

/// Configuration for [`FilterConfig::build`].
///
/// # Example
///
/// ```
/// use biquad_simd::{FilterConfig, LaneWidth, SolverKind};
///
/// let config = FilterConfig {
///     lanes: LaneWidth::X8,
///     vectors: 4,
///     solver: Some(SolverKind::CyclicReduction),
/// };
/// let mut filter = config
///     .build(&[[1.0, 1.0, 2.0, 0.4, 0.5]], &[[0.0; 4]])
///     .unwrap();
///
/// let input = [1.0f32; 100];
/// let mut output = [0.0f32; 100];
/// assert_eq!(filter.process(&input, &mut output), 100);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterConfig {
    /// Vector width (default: widest the CPU supports).
    pub lanes: LaneWidth,
    /// Vectors per block, one of [`SUPPORTED_VECTORS`] (default: 4).
    pub vectors: usize,
    /// Block algorithm; `None` picks the matrix solver for one vector and
    /// recursive doubling otherwise.
    pub solver: Option<SolverKind>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        #[cfg(feature = "std")]
        let lanes = LaneWidth::detect();
        #[cfg(not(feature = "std"))]
        let lanes = LaneWidth::default();
        FilterConfig {
            lanes,
            vectors: DEFAULT_VECTORS,
            solver: None,
        }
    }
}

impl FilterConfig {
    /// Algorithm actually used for this configuration.
    pub fn solver_kind(&self) -> SolverKind {
        self.solver
            .unwrap_or_else(|| SolverKind::default_for(self.vectors))
    }

    /// Check the configuration without building anything.
    ///
    /// # Errors
    /// `UnsupportedBlockVectors` for a shape outside [`SUPPORTED_VECTORS`],
    /// `SolverShape` for an algorithm that does not run on that shape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_VECTORS.contains(&self.vectors) {
            return Err(ConfigError::UnsupportedBlockVectors(self.vectors));
        }
        let solver = self.solver_kind();
        if !solver.supports(self.vectors) {
            return Err(ConfigError::SolverShape {
                solver,
                vectors: self.vectors,
            });
        }
        Ok(())
    }

    /// Build a cascade with one section per tap array.
    ///
    /// `taps` holds `[1, b1, b2, a1, a2]` and `initial` holds
    /// `[xi1, xi2, yi1, yi2]` for each section.
    ///
    /// # Errors
    /// `CascadeLength` when the two slices differ in length, plus everything
    /// [`validate`](Self::validate) reports.
    pub fn build(
        &self,
        taps: &[[f32; 5]],
        initial: &[[f32; 4]],
    ) -> Result<Box<dyn SampleFilter>, ConfigError> {
        if taps.len() != initial.len() {
            return Err(ConfigError::CascadeLength {
                taps: taps.len(),
                initial: initial.len(),
            });
        }
        self.validate()?;
        let solver = self.solver_kind();
        log::debug!(
            "building {} section cascade: {:?} x {} vectors, {}",
            taps.len(),
            self.lanes,
            self.vectors,
            solver
        );
        match self.lanes {
            LaneWidth::X4 => build_for_width::<f32x4>(self.vectors, solver, taps, initial),
            LaneWidth::X8 => build_for_width::<f32x8>(self.vectors, solver, taps, initial),
            LaneWidth::X16 => build_for_width::<f32x16>(self.vectors, solver, taps, initial),
        }
    }
}

macro_rules! shape_table {
    (@call $build:ident::<$v:ty, $n:literal> ($($arg:expr),*)) => {
        $build::<$v, $n>($($arg),*)
    };
    ($vectors:expr, $build:ident::<$v:ty> $args:tt; $($n:literal)+) => {
        match $vectors {
            $($n => shape_table!(@call $build::<$v, $n> $args),)+
            other => Err(ConfigError::UnsupportedBlockVectors(other)),
        }
    };
}

fn build_for_width<V: SimdVector>(
    vectors: usize,
    solver: SolverKind,
    taps: &[[f32; 5]],
    initial: &[[f32; 4]],
) -> Result<Box<dyn SampleFilter>, ConfigError> {
    shape_table!(vectors, build_cascade::<V>(solver, taps, initial); 1 2 4 8 16)
}

fn build_cascade<V: SimdVector, const N: usize>(
    solver: SolverKind,
    taps: &[[f32; 5]],
    initial: &[[f32; 4]],
) -> Result<Box<dyn SampleFilter>, ConfigError> {
    let sections = taps
        .iter()
        .zip(initial)
        .map(|(taps, initial)| {
            Section::<V, N>::with_solver(
                Coefficients::from_taps(taps),
                InitialConditions::from_array(initial),
                solver,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(Filter::<V, _, N>::new(sections)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAPS: [[f32; 5]; 1] = [[1.0, 1.0, 2.0, 0.4, 0.5]];
    const INIT: [[f32; 4]; 1] = [[2.0, 1.0, -3.0, -5.0]];

    #[test]
    fn reports_shape() {
        let config = FilterConfig {
            lanes: LaneWidth::X16,
            vectors: 8,
            solver: None,
        };
        let filter = config.build(&TAPS, &INIT).unwrap();
        assert_eq!(filter.lanes(), LaneWidth::X16);
        assert_eq!(filter.vectors(), 8);
        assert_eq!(filter.block_len(), 128);
        assert_eq!(filter.state()[0], InitialConditions::from_array(&INIT[0]));
    }

    #[test]
    fn rejects_bad_keys() {
        let config = FilterConfig {
            lanes: LaneWidth::X4,
            vectors: 3,
            solver: None,
        };
        assert_eq!(
            config.build(&TAPS, &INIT).err(),
            Some(ConfigError::UnsupportedBlockVectors(3))
        );
        let config = FilterConfig {
            vectors: 1,
            solver: Some(SolverKind::RecursiveDoubling),
            ..config
        };
        assert_eq!(
            config.build(&TAPS, &INIT).err(),
            Some(ConfigError::SolverShape {
                solver: SolverKind::RecursiveDoubling,
                vectors: 1
            })
        );
        assert_eq!(
            FilterConfig::default().build(&TAPS, &[]).err(),
            Some(ConfigError::CascadeLength { taps: 1, initial: 0 })
        );
    }

    #[test]
    fn singular_reduction_fails_build() {
        let config = FilterConfig {
            lanes: LaneWidth::X4,
            vectors: 4,
            solver: Some(SolverKind::CyclicReduction),
        };
        let taps = [TAPS[0], [1.0, 0.0, 0.0, 1.0, -0.5]];
        let initial = [INIT[0]; 2];
        assert_eq!(
            config.build(&taps, &initial).err(),
            Some(ConfigError::SingularReduction { level: 1 })
        );
        let config = FilterConfig {
            solver: None,
            ..config
        };
        assert!(config.build(&taps, &initial).is_ok());
    }

    #[test]
    fn default_config_is_valid() {
        let config = FilterConfig::default();
        assert_eq!(config.vectors, DEFAULT_VECTORS);
        assert_eq!(config.solver_kind(), SolverKind::RecursiveDoubling);
        assert!(config.validate().is_ok());
    }
}
