// This file is part of biquad-simd.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Chains of sections and the streaming wrapper.

use core::marker::PhantomData;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::section::{Section, Stage};
use crate::simd::SimdVector;

/// `M` stages of the same type, applied in order.
#[derive(Clone, Debug)]
pub struct Cascade<S, const M: usize> {
    stages: [S; M],
}

impl<S, const M: usize> Cascade<S, M> {
    /// Chain the given stages, index 0 first.
    pub fn new(stages: [S; M]) -> Self {
        Cascade { stages }
    }

    /// Stages in processing order.
    pub fn stages(&self) -> &[S; M] {
        &self.stages
    }

    /// Mutable access to the stages.
    pub fn stages_mut(&mut self) -> &mut [S; M] {
        &mut self.stages
    }
}

impl<V: SimdVector, const N: usize, const M: usize> Cascade<Section<V, N>, M> {
    /// Sections from `[1, b1, b2, a1, a2]` taps and `[xi1, xi2, yi1, yi2]`
    /// initial conditions, one pair per section.
    pub fn from_coefficients(taps: &[[f32; 5]; M], initial: &[[f32; 4]; M]) -> Self {
        Cascade::new(core::array::from_fn(|i| {
            Section::from_taps(&taps[i], &initial[i])
        }))
    }
}

impl<V: SimdVector, S: Stage<V, N>, const N: usize, const M: usize> Stage<V, N> for Cascade<S, M> {
    #[inline]
    fn process_block(&mut self, block: &mut [V; N]) {
        for stage in self.stages.iter_mut() {
            stage.process_block(block);
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        self.stages
            .iter_mut()
            .fold(x, |acc, stage| stage.process_sample(acc))
    }

    fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }
}

#[cfg(feature = "alloc")]
impl<V: SimdVector, S: Stage<V, N>, const N: usize> Stage<V, N> for Vec<S> {
    #[inline]
    fn process_block(&mut self, block: &mut [V; N]) {
        for stage in self.iter_mut() {
            stage.process_block(block);
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        self.iter_mut().fold(x, |acc, stage| stage.process_sample(acc))
    }

    fn reset(&mut self) {
        for stage in self.iter_mut() {
            stage.reset();
        }
    }
}

macro_rules! tuple_stage {
    ($($name:ident $idx:tt),+) => {
        impl<V: SimdVector, const N: usize, $($name: Stage<V, N>),+> Stage<V, N> for ($($name,)+) {
            #[inline]
            fn process_block(&mut self, block: &mut [V; N]) {
                $(self.$idx.process_block(block);)+
            }

            #[inline]
            fn process_sample(&mut self, x: f32) -> f32 {
                let y = x;
                $(let y = self.$idx.process_sample(y);)+
                y
            }

            fn reset(&mut self) {
                $(self.$idx.reset();)+
            }
        }
    };
}

tuple_stage!(A 0);
tuple_stage!(A 0, B 1);
tuple_stage!(A 0, B 1, C 2);
tuple_stage!(A 0, B 1, C 2, D 3);
tuple_stage!(A 0, B 1, C 2, D 3, E 4);
tuple_stage!(A 0, B 1, C 2, D 3, E 4, F 5);

/// Streams samples through a stage: whole blocks of `N * V::LANES` samples
/// take the block path, the tail goes through sample by sample.
///
/// Both paths share the stage's histories, so any split of a stream into
/// calls produces the same output.
#[derive(Clone, Debug)]
pub struct Filter<V, S, const N: usize> {
    stage: S,
    _vector: PhantomData<V>,
}

impl<V: SimdVector, S: Stage<V, N>, const N: usize> Filter<V, S, N> {
    /// Samples per block.
    pub const BLOCK_LEN: usize = N * V::LANES;

    /// Wrap a stage.
    pub fn new(stage: S) -> Self {
        Filter {
            stage,
            _vector: PhantomData,
        }
    }

    /// The wrapped stage.
    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Mutable access to the wrapped stage.
    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    /// Unwrap the stage.
    pub fn into_inner(self) -> S {
        self.stage
    }

    /// Zero the stage histories.
    pub fn reset(&mut self) {
        self.stage.reset();
    }

    /// Filter `min(input.len(), output.len())` samples from `input` into
    /// `output`. Returns the number of samples written.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let len = input.len().min(output.len());
        let (input, output) = (&input[..len], &mut output[..len]);

        let mut src_blocks = input.chunks_exact(Self::BLOCK_LEN);
        let mut dst_blocks = output.chunks_exact_mut(Self::BLOCK_LEN);
        for (src, dst) in (&mut src_blocks).zip(&mut dst_blocks) {
            let mut block: [V; N] = core::array::from_fn(|n| V::from_slice(&src[n * V::LANES..]));
            self.stage.process_block(&mut block);
            for (n, v) in block.iter().enumerate() {
                v.write_to_slice(&mut dst[n * V::LANES..]);
            }
        }
        for (x, y) in src_blocks
            .remainder()
            .iter()
            .zip(dst_blocks.into_remainder())
        {
            *y = self.stage.process_sample(*x);
        }
        len
    }

    /// Filter `buf` in place. Returns its length.
    pub fn process_in_place(&mut self, buf: &mut [f32]) -> usize {
        let mut blocks = buf.chunks_exact_mut(Self::BLOCK_LEN);
        for chunk in &mut blocks {
            let mut block: [V; N] = core::array::from_fn(|n| V::from_slice(&chunk[n * V::LANES..]));
            self.stage.process_block(&mut block);
            for (n, v) in block.iter().enumerate() {
                v.write_to_slice(&mut chunk[n * V::LANES..]);
            }
        }
        for x in blocks.into_remainder() {
            *x = self.stage.process_sample(*x);
        }
        buf.len()
    }
}
