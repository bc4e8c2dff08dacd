// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Direct per-sample evaluation of the recurrence.

use crate::section::{Coefficients, InitialConditions};

/// Serial biquad: one multiply-add chain per sample.
#[derive(Clone, Copy, Debug)]
pub struct SerialBiquad {
    coefficients: Coefficients,
    state: InitialConditions,
}

impl SerialBiquad {
    /// Biquad starting from `initial`.
    pub fn new(coefficients: Coefficients, initial: InitialConditions) -> Self {
        SerialBiquad {
            coefficients,
            state: initial,
        }
    }

    /// Filter one sample.
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let Coefficients { b1, b2, a1, a2 } = self.coefficients;
        let s = &mut self.state;
        let y = x + b2 * s.xi2 + b1 * s.xi1 + a2 * s.yi2 + a1 * s.yi1;
        s.xi2 = s.xi1;
        s.xi1 = x;
        s.yi2 = s.yi1;
        s.yi1 = y;
        y
    }

    /// Filter a buffer in place.
    pub fn process_in_place(&mut self, buf: &mut [f32]) {
        for x in buf.iter_mut() {
            *x = self.process_sample(*x);
        }
    }

    /// Current histories.
    pub fn state(&self) -> InitialConditions {
        self.state
    }
}

/// Filter `min(input.len(), output.len())` samples serially. Returns the
/// number of samples written.
pub fn filter_serial(
    coefficients: Coefficients,
    initial: InitialConditions,
    input: &[f32],
    output: &mut [f32],
) -> usize {
    let mut biquad = SerialBiquad::new(coefficients, initial);
    let mut written = 0;
    for (x, y) in input.iter().zip(output.iter_mut()) {
        *y = biquad.process_sample(*x);
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_scenario() {
        let mut out = [0.0f32; 2];
        let n = filter_serial(
            Coefficients::new(1.0, 2.0, 0.4, 0.5),
            InitialConditions::new(2.0, 1.0, -3.0, -5.0),
            &[0.0, 1.0, 2.0],
            &mut out,
        );
        assert_eq!(n, 2);
        let (d0, d1) = (out[0] - 0.3, out[1] - 3.62);
        assert!(d0 * d0 < 1e-10 && d1 * d1 < 1e-10, "{:?}", out);
    }

    #[test]
    fn state_tracks_last_samples() {
        let mut biquad = SerialBiquad::new(
            Coefficients::new(0.0, 0.0, 0.5, 0.0),
            InitialConditions::default(),
        );
        let mut buf = [1.0f32, 0.0, 0.0];
        biquad.process_in_place(&mut buf);
        assert_eq!(buf, [1.0, 0.5, 0.25]);
        assert_eq!(biquad.state(), InitialConditions::new(0.0, 0.0, 0.25, 0.5));
    }
}
