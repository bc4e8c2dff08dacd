// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use core::fmt;

use crate::block_filter::BlockMatrix;
use crate::cyclic_reduction::{CyclicReduction, MAX_LEVELS};
use crate::decomposition::{RecurrenceSolver, RecursiveDoubling};
use crate::fir_core::FirCore;
use crate::shift_reg::ShiftReg;
use crate::simd::SimdVector;
use crate::transpose::{detranspose, transpose};
use crate::ConfigError;

/// Largest supported number of vectors per block.
pub const MAX_BLOCK_VECTORS: usize = 1 << (MAX_LEVELS - 1);

/// Taps of `y[n] = x[n] + b1*x[n-1] + b2*x[n-2] + a1*y[n-1] + a2*y[n-2]`.
///
/// Feedback taps enter with a positive sign.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coefficients {
    /// Weight of `x[n-1]`.
    pub b1: f32,
    /// Weight of `x[n-2]`.
    pub b2: f32,
    /// Weight of `y[n-1]`.
    pub a1: f32,
    /// Weight of `y[n-2]`.
    pub a2: f32,
}

impl Coefficients {
    /// Taps from scalars.
    pub const fn new(b1: f32, b2: f32, a1: f32, a2: f32) -> Self {
        Coefficients { b1, b2, a1, a2 }
    }

    /// Taps from `[a0, b1, b2, a1, a2]`. The leading tap is fixed at 1 and
    /// ignored.
    pub fn from_taps(taps: &[f32; 5]) -> Self {
        if taps[0] != 1.0 {
            log::warn!("leading tap {} ignored, sections are normalized to 1", taps[0]);
        }
        Coefficients::new(taps[1], taps[2], taps[3], taps[4])
    }

    /// `[1, b1, b2, a1, a2]`.
    pub fn to_taps(&self) -> [f32; 5] {
        [1.0, self.b1, self.b2, self.a1, self.a2]
    }
}

/// Samples preceding the first input: `x[-1]`, `x[-2]`, `y[-1]`, `y[-2]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InitialConditions {
    /// `x[-1]`
    pub xi1: f32,
    /// `x[-2]`
    pub xi2: f32,
    /// `y[-1]`
    pub yi1: f32,
    /// `y[-2]`
    pub yi2: f32,
}

impl InitialConditions {
    /// Conditions from scalars.
    pub const fn new(xi1: f32, xi2: f32, yi1: f32, yi2: f32) -> Self {
        InitialConditions { xi1, xi2, yi1, yi2 }
    }

    /// Conditions from `[xi1, xi2, yi1, yi2]`.
    pub const fn from_array(values: &[f32; 4]) -> Self {
        InitialConditions::new(values[0], values[1], values[2], values[3])
    }

    /// `[xi1, xi2, yi1, yi2]`.
    pub const fn to_array(&self) -> [f32; 4] {
        [self.xi1, self.xi2, self.yi1, self.yi2]
    }
}

/// Block algorithm used by a [`Section`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolverKind {
    /// Particular/homogeneous split with a recursive-doubling lane scan.
    /// Needs at least two vectors per block.
    RecursiveDoubling,
    /// Cyclic reduction. Needs at least two vectors per block.
    CyclicReduction,
    /// Precomputed impulse matrix. Needs exactly one vector per block.
    BlockMatrix,
}

impl SolverKind {
    /// Default algorithm for `vectors` per block.
    pub const fn default_for(vectors: usize) -> Self {
        if vectors == 1 {
            SolverKind::BlockMatrix
        } else {
            SolverKind::RecursiveDoubling
        }
    }

    /// Whether the algorithm runs on blocks of `vectors` vectors.
    pub const fn supports(self, vectors: usize) -> bool {
        match self {
            SolverKind::BlockMatrix => vectors == 1,
            SolverKind::RecursiveDoubling | SolverKind::CyclicReduction => vectors >= 2,
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverKind::RecursiveDoubling => "recursive doubling",
            SolverKind::CyclicReduction => "cyclic reduction",
            SolverKind::BlockMatrix => "block matrix",
        };
        f.write_str(name)
    }
}

/// One element of a filter chain: blocks of `N` vectors of `V` in
/// natural (block-major) order, or single samples.
pub trait Stage<V: SimdVector, const N: usize> {
    /// Filter a block of `N * V::LANES` consecutive samples in place.
    fn process_block(&mut self, block: &mut [V; N]);
    /// Filter one sample.
    fn process_sample(&mut self, x: f32) -> f32;
    /// Zero all histories.
    fn reset(&mut self);
}

#[derive(Clone, Debug)]
enum Solver<V, const N: usize> {
    Doubling(RecursiveDoubling<V, N>),
    Cyclic(CyclicReduction<V, N>),
    Matrix(BlockMatrix<V>),
}

/// Second-order section processing blocks of `N` vectors.
///
/// `N` must be a power of two no larger than [`MAX_BLOCK_VECTORS`]; other
/// values fail to compile when the section is constructed.
#[derive(Clone, Debug)]
pub struct Section<V, const N: usize> {
    coefficients: Coefficients,
    fir: FirCore<V>,
    solver: Solver<V, N>,
    x_hist: ShiftReg<V>,
    y_hist: ShiftReg<V>,
}

impl<V: SimdVector, const N: usize> Section<V, N> {
    const SHAPE_OK: () = assert!(
        N.is_power_of_two() && N <= MAX_BLOCK_VECTORS,
        "vectors per block must be a power of two up to 2^15"
    );

    /// Section with the default algorithm for `N`.
    pub fn new(coefficients: Coefficients, initial: InitialConditions) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SHAPE_OK;
        let Coefficients { b1, b2, a1, a2 } = coefficients;
        let solver = if N == 1 {
            Solver::Matrix(BlockMatrix::new(b1, b2, a1, a2))
        } else {
            Solver::Doubling(RecursiveDoubling::new(a1, a2))
        };
        Self::build(coefficients, initial, solver)
    }

    /// Section from a `[1, b1, b2, a1, a2]` tap array and
    /// `[xi1, xi2, yi1, yi2]` initial conditions.
    pub fn from_taps(taps: &[f32; 5], initial: &[f32; 4]) -> Self {
        Self::new(
            Coefficients::from_taps(taps),
            InitialConditions::from_array(initial),
        )
    }

    /// Section with an explicit algorithm.
    ///
    /// # Errors
    /// `ConfigError::SolverShape` if `solver` does not run on `N` vectors,
    /// `ConfigError::SingularReduction` if cyclic reduction has no usable
    /// pivot for the feedback taps.
    pub fn with_solver(
        coefficients: Coefficients,
        initial: InitialConditions,
        solver: SolverKind,
    ) -> Result<Self, ConfigError> {
        #[allow(clippy::let_unit_value)]
        let () = Self::SHAPE_OK;
        if !solver.supports(N) {
            return Err(ConfigError::SolverShape { solver, vectors: N });
        }
        let Coefficients { b1, b2, a1, a2 } = coefficients;
        let solver = match solver {
            SolverKind::RecursiveDoubling => Solver::Doubling(RecursiveDoubling::new(a1, a2)),
            SolverKind::CyclicReduction => Solver::Cyclic(CyclicReduction::new(a1, a2)?),
            SolverKind::BlockMatrix => Solver::Matrix(BlockMatrix::new(b1, b2, a1, a2)),
        };
        Ok(Self::build(coefficients, initial, solver))
    }

    fn build(coefficients: Coefficients, initial: InitialConditions, solver: Solver<V, N>) -> Self {
        let Coefficients { b1, b2, .. } = coefficients;
        let mut section = Section {
            coefficients,
            fir: FirCore::new(b1, b2),
            solver,
            x_hist: ShiftReg::new(),
            y_hist: ShiftReg::new(),
        };
        section.set_state(initial);
        section
    }

    /// Taps of this section.
    pub fn coefficients(&self) -> Coefficients {
        self.coefficients
    }

    /// Algorithm in use.
    pub fn solver(&self) -> SolverKind {
        match self.solver {
            Solver::Doubling(_) => SolverKind::RecursiveDoubling,
            Solver::Cyclic(_) => SolverKind::CyclicReduction,
            Solver::Matrix(_) => SolverKind::BlockMatrix,
        }
    }

    /// The two newest inputs and outputs seen so far.
    pub fn state(&self) -> InitialConditions {
        InitialConditions {
            xi1: self.x_hist.get(-1),
            xi2: self.x_hist.get(-2),
            yi1: self.y_hist.get(-1),
            yi2: self.y_hist.get(-2),
        }
    }

    /// Restore histories saved by [`state`](Self::state).
    pub fn set_state(&mut self, state: InitialConditions) {
        self.x_hist = ShiftReg::primed(state.xi2, state.xi1);
        self.y_hist = ShiftReg::primed(state.yi2, state.yi1);
    }
}

impl<V: SimdVector, const N: usize> Stage<V, N> for Section<V, N> {
    #[inline]
    fn process_block(&mut self, block: &mut [V; N]) {
        match &self.solver {
            Solver::Matrix(matrix) => {
                for v in block.iter_mut() {
                    *v = matrix.apply(*v, &mut self.x_hist, &mut self.y_hist);
                }
            }
            Solver::Doubling(solver) => {
                transpose(block);
                self.fir.apply(block, &mut self.x_hist);
                solver.solve(block, &mut self.y_hist);
                detranspose(block);
            }
            Solver::Cyclic(solver) => {
                transpose(block);
                self.fir.apply(block, &mut self.x_hist);
                solver.solve(block, &mut self.y_hist);
                detranspose(block);
            }
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        let Coefficients { b1, b2, a1, a2 } = self.coefficients;
        let y = x
            + b2 * self.x_hist.get(-2)
            + b1 * self.x_hist.get(-1)
            + a2 * self.y_hist.get(-2)
            + a1 * self.y_hist.get(-1);
        self.x_hist.shift(x);
        self.y_hist.shift(y);
        y
    }

    fn reset(&mut self) {
        self.x_hist.reset();
        self.y_hist.reset();
    }
}
