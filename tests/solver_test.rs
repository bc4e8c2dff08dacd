// Block solvers against the serial recurrence.
//
// Taps and histories follow the usual ramp check: b2=2, b1=1, a1=0.4,
// a2=0.5, x[-2]=1, x[-1]=2, y[-1]=-3, y[-2]=-5.

use biquad_simd::reference::filter_serial;
use biquad_simd::{
    Coefficients, Filter, InitialConditions, Section, SimdVector, SolverKind, Stage,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wide::{f32x16, f32x4, f32x8};

const RAMP_TAPS: Coefficients = Coefficients::new(1.0, 2.0, 0.4, 0.5);
const RAMP_INIT: InitialConditions = InitialConditions::new(2.0, 1.0, -3.0, -5.0);

/// Relative tolerance with an absolute floor of one.
fn assert_close(got: &[f32], expected: &[f32], what: &str) {
    assert_eq!(got.len(), expected.len());
    for (i, (g, e)) in got.iter().zip(expected).enumerate() {
        let tol = 1e-4 * e.abs().max(1.0);
        assert!(
            (g - e).abs() <= tol,
            "{}: sample {} got {} expected {}",
            what,
            i,
            g,
            e
        );
    }
}

fn serial(coefficients: Coefficients, initial: InitialConditions, input: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0; input.len()];
    filter_serial(coefficients, initial, input, &mut out);
    out
}

fn block_output<V: SimdVector, const N: usize>(
    solver: SolverKind,
    coefficients: Coefficients,
    initial: InitialConditions,
    input: &[f32],
) -> Vec<f32> {
    let section = Section::<V, N>::with_solver(coefficients, initial, solver).unwrap();
    let mut filter = Filter::<V, _, N>::new(section);
    let mut out = vec![0.0; input.len()];
    assert_eq!(filter.process(input, &mut out), input.len());
    out
}

fn random_signal(seed: u64, len: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

macro_rules! solver_matches_serial {
    ($name:ident, $v:ty, $n:literal, $solver:expr) => {
        #[test]
        fn $name() {
            let block = $n * <$v as SimdVector>::LANES;
            let coefficient_sets = [
                RAMP_TAPS,
                Coefficients::new(0.3, -0.2, 1.2, -0.5),
                Coefficients::new(0.5, 0.25, 1.6, -0.8),
                Coefficients::new(0.1, 0.2, -0.7, 0.1),
            ];
            for (k, coefficients) in coefficient_sets.iter().enumerate() {
                // Whole blocks plus a ragged tail.
                let input = random_signal(k as u64, block * 5 + 3);
                let expected = serial(*coefficients, RAMP_INIT, &input);
                let got = block_output::<$v, $n>($solver, *coefficients, RAMP_INIT, &input);
                assert_close(&got, &expected, stringify!($name));
            }
        }
    };
}

solver_matches_serial!(doubling_x4_n2, f32x4, 2, SolverKind::RecursiveDoubling);
solver_matches_serial!(doubling_x4_n4, f32x4, 4, SolverKind::RecursiveDoubling);
solver_matches_serial!(doubling_x8_n8, f32x8, 8, SolverKind::RecursiveDoubling);
solver_matches_serial!(doubling_x16_n16, f32x16, 16, SolverKind::RecursiveDoubling);
solver_matches_serial!(doubling_x16_n2, f32x16, 2, SolverKind::RecursiveDoubling);
solver_matches_serial!(cyclic_x4_n2, f32x4, 2, SolverKind::CyclicReduction);
solver_matches_serial!(cyclic_x4_n16, f32x4, 16, SolverKind::CyclicReduction);
solver_matches_serial!(cyclic_x8_n4, f32x8, 4, SolverKind::CyclicReduction);
solver_matches_serial!(cyclic_x16_n8, f32x16, 8, SolverKind::CyclicReduction);
solver_matches_serial!(matrix_x4, f32x4, 1, SolverKind::BlockMatrix);
solver_matches_serial!(matrix_x8, f32x8, 1, SolverKind::BlockMatrix);
solver_matches_serial!(matrix_x16, f32x16, 1, SolverKind::BlockMatrix);

/// First two outputs of the ramp x[n] = n, at every width and solver.
fn check_ramp<V: SimdVector, const N: usize>(solver: SolverKind) {
    let input: Vec<f32> = (0..N * V::LANES).map(|n| n as f32).collect();
    let got = block_output::<V, N>(solver, RAMP_TAPS, RAMP_INIT, &input);
    assert!((got[0] - 0.3).abs() < 1e-5, "{:?}: y[0] = {}", solver, got[0]);
    assert!((got[1] - 3.62).abs() < 1e-5, "{:?}: y[1] = {}", solver, got[1]);
    assert_close(&got, &serial(RAMP_TAPS, RAMP_INIT, &input), "ramp");
}

/// y[0] = 0.3 and y[1] = 3.62 for widths 4, 8 and 16.
#[test]
fn ramp_first_outputs() {
    check_ramp::<f32x4, 4>(SolverKind::RecursiveDoubling);
    check_ramp::<f32x8, 8>(SolverKind::RecursiveDoubling);
    check_ramp::<f32x16, 16>(SolverKind::RecursiveDoubling);
    check_ramp::<f32x4, 4>(SolverKind::CyclicReduction);
    check_ramp::<f32x8, 8>(SolverKind::CyclicReduction);
    check_ramp::<f32x16, 16>(SolverKind::CyclicReduction);
    check_ramp::<f32x4, 1>(SolverKind::BlockMatrix);
    check_ramp::<f32x8, 1>(SolverKind::BlockMatrix);
    check_ramp::<f32x16, 1>(SolverKind::BlockMatrix);
}

/// Impulse response against the closed form from the characteristic roots.
///
/// With distinct real roots r1, r2 of z^2 - a1 z - a2, the all-pole response
/// is (r1^(n+1) - r2^(n+1)) / (r1 - r2); the zeros add b1 and b2 delayed
/// copies of it.
#[test]
fn impulse_response_matches_roots() {
    let (b1, b2, a1, a2) = (1.0f64, 2.0f64, 0.4f64, 0.5f64);
    let disc = (a1 * a1 + 4.0 * a2).sqrt();
    let (r1, r2) = ((a1 + disc) / 2.0, (a1 - disc) / 2.0);
    let all_pole = |n: i32| {
        if n < 0 {
            0.0
        } else {
            (r1.powi(n + 1) - r2.powi(n + 1)) / (r1 - r2)
        }
    };
    let expected: Vec<f32> = (0..64)
        .map(|n| (all_pole(n) + b1 * all_pole(n - 1) + b2 * all_pole(n - 2)) as f32)
        .collect();
    let mut impulse = vec![0.0f32; 64];
    impulse[0] = 1.0;

    let zero = InitialConditions::default();
    for solver in [SolverKind::RecursiveDoubling, SolverKind::CyclicReduction] {
        let got = block_output::<f32x8, 4>(solver, RAMP_TAPS, zero, &impulse);
        assert_close(&got, &expected, "impulse");
    }
    let got = block_output::<f32x16, 1>(SolverKind::BlockMatrix, RAMP_TAPS, zero, &impulse);
    assert_close(&got, &expected, "impulse matrix");
}

/// The three solvers agree on the same stream.
#[test]
fn solvers_agree() {
    let coefficients = Coefficients::new(-0.4, 0.3, 1.1, -0.35);
    let input = random_signal(99, 16 * 30);
    let doubling = block_output::<f32x4, 4>(
        SolverKind::RecursiveDoubling,
        coefficients,
        RAMP_INIT,
        &input,
    );
    let cyclic =
        block_output::<f32x4, 4>(SolverKind::CyclicReduction, coefficients, RAMP_INIT, &input);
    let matrix = block_output::<f32x4, 1>(SolverKind::BlockMatrix, coefficients, RAMP_INIT, &input);
    assert_close(&cyclic, &doubling, "cyclic vs doubling");
    assert_close(&matrix, &doubling, "matrix vs doubling");
}

/// Histories after a block equal the last two inputs and outputs.
#[test]
fn block_leaves_trailing_history() {
    let input: Vec<f32> = (0..32).map(|n| n as f32 * 0.25).collect();
    let expected = serial(RAMP_TAPS, RAMP_INIT, &input);
    for solver in [SolverKind::RecursiveDoubling, SolverKind::CyclicReduction] {
        let mut section = Section::<f32x8, 4>::with_solver(RAMP_TAPS, RAMP_INIT, solver).unwrap();
        let mut block: [f32x8; 4] =
            core::array::from_fn(|n| <f32x8 as SimdVector>::from_slice(&input[n * 8..]));
        section.process_block(&mut block);
        let state = section.state();
        assert_eq!(state.xi1, input[31]);
        assert_eq!(state.xi2, input[30]);
        assert!((state.yi1 - expected[31]).abs() <= 1e-4 * expected[31].abs().max(1.0));
        assert!((state.yi2 - expected[30]).abs() <= 1e-4 * expected[30].abs().max(1.0));
    }
}
