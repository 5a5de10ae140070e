//! Dropout layer implementation for regularization
//!
//! This module provides a DropoutLayer that randomly drops (sets to zero) a fraction
//! of its inputs during training. Kept values are divided by the keep rate so the
//! expected output matches inference, where inputs pass through unchanged.
//!
//! The layer holds no mask between calls. Backward recovers which positions were
//! dropped from the forward output itself: a zero output gets a zero gradient,
//! anything else is passed through unchanged. A kept value that is exactly zero is
//! treated as dropped, which is harmless since its contribution is zero either way.

use crate::error::NetworkError;
use crate::layers::r#trait::{Layer, LayerCache, Pass};
use crate::network::LayerValue;
use crate::utils::parallel::ExecutionPolicy;
use rand::{Rng, RngCore};

/// Dropout layer for regularization.
///
/// # Fields
///
/// * `size` - Number of input/output features (dropout doesn't change dimensions)
/// * `keep_rate` - Probability of keeping each value, strictly between 0 and 1
///
/// # Example
///
/// ```
/// use feedforward_engine::layers::{DropoutLayer, Layer};
/// use feedforward_engine::utils::ExecutionPolicy;
///
/// let layer = DropoutLayer::new(4, 0.5).unwrap();
/// let output = layer.infer(&[1.0, 2.0, 3.0, 4.0], ExecutionPolicy::sequential());
/// assert_eq!(output, vec![1.0, 2.0, 3.0, 4.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DropoutLayer {
    size: usize,
    keep_rate: f32,
}

impl DropoutLayer {
    /// Creates a new dropout layer.
    ///
    /// # Errors
    ///
    /// Returns an error when `keep_rate` is not strictly between 0 and 1.
    pub fn new(size: usize, keep_rate: f32) -> Result<Self, NetworkError> {
        check_keep_rate(keep_rate)?;
        Ok(Self { size, keep_rate })
    }

    /// Probability of keeping each value.
    pub fn keep_rate(&self) -> f32 {
        self.keep_rate
    }
}

impl Layer for DropoutLayer {
    fn kind(&self) -> &'static str {
        "dropout"
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }

    fn forward(
        &self,
        input: &[f32],
        pass: &mut Pass<'_>,
        _policy: ExecutionPolicy,
    ) -> (Vec<f32>, LayerCache) {
        assert_eq!(input.len(), self.size, "dropout input width mismatch");
        let mut output = input.to_vec();
        if let Some(rng) = pass.rng() {
            apply_mask(&mut output, self.keep_rate, rng);
        }
        (output, LayerCache::default())
    }

    fn local_delta(&self, output: &[f32], output_delta: &[f32], _cache: &LayerCache) -> Vec<f32> {
        gate_delta(output, output_delta)
    }

    fn backward(&self, delta: &[f32], _policy: ExecutionPolicy) -> Vec<f32> {
        delta.to_vec()
    }

    fn into_value(self: Box<Self>) -> LayerValue {
        LayerValue::default()
    }
}

/// Check that a keep rate lies strictly between 0 and 1.
pub(crate) fn check_keep_rate(keep_rate: f32) -> Result<(), NetworkError> {
    if keep_rate > 0.0 && keep_rate < 1.0 {
        Ok(())
    } else {
        Err(NetworkError::InvalidKeepRate(keep_rate))
    }
}

/// Zero each value with probability `1 - keep_rate`, divide survivors by `keep_rate`.
pub(crate) fn apply_mask<R: RngCore + ?Sized>(values: &mut [f32], keep_rate: f32, rng: &mut R) {
    for value in values {
        if rng.gen::<f32>() < keep_rate {
            *value /= keep_rate;
        } else {
            *value = 0.0;
        }
    }
}

/// Pass `delta` through where `output` is non-zero, zero it elsewhere.
pub(crate) fn gate_delta(output: &[f32], delta: &[f32]) -> Vec<f32> {
    output
        .iter()
        .zip(delta)
        .map(|(&o, &d)| if o != 0.0 { d } else { 0.0 })
        .collect()
}
