//! Weighted-sum unit
//!
//! A unit owns one weight per input feature and a bias. Its forward value is the
//! dot product with the input plus the bias; activation is applied by the layer.

use crate::gradient::UnitGradient;
use crate::optimizers::{Optimizer, UnitOptimizers};
use crate::utils::atomic::AtomicF32;
use crate::utils::parallel::ExecutionPolicy;

/// One weight vector plus bias.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    weights: Vec<f32>,
    bias: f32,
}

impl Unit {
    /// Create a unit from explicit parameters.
    ///
    /// # Panics
    ///
    /// Panics if `weights` is empty.
    pub fn new(weights: Vec<f32>, bias: f32) -> Self {
        assert!(!weights.is_empty(), "unit must have at least one weight");
        Self { weights, bias }
    }

    /// Create a unit with `input_size` zero weights and a zero bias.
    pub fn zeros(input_size: usize) -> Self {
        Self::new(vec![0.0; input_size], 0.0)
    }

    pub fn input_size(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// `Σ wᵢ·xᵢ + b`.
    ///
    /// # Panics
    ///
    /// Panics if `input.len()` differs from the weight count.
    pub fn forward(&self, input: &[f32]) -> f32 {
        assert_eq!(
            input.len(),
            self.weights.len(),
            "unit input width mismatch"
        );
        self.weights
            .iter()
            .zip(input)
            .map(|(w, x)| w * x)
            .sum::<f32>()
            + self.bias
    }

    /// Add `delta · wᵢ` into `result[i]` for every input.
    pub fn backward(&self, delta: f32, result: &[AtomicF32], policy: ExecutionPolicy) {
        debug_assert_eq!(result.len(), self.weights.len());
        for (slot, w) in result.iter().zip(&self.weights) {
            policy.accumulate(slot, delta * w);
        }
    }

    /// Add `delta · xᵢ` into the weight gradient and `delta` into the bias gradient.
    pub fn calc_gradient(
        input: &[f32],
        delta: f32,
        gradient: UnitGradient<'_>,
        policy: ExecutionPolicy,
    ) {
        debug_assert_eq!(input.len(), gradient.weights.len());
        for (slot, x) in gradient.weights.iter().zip(input) {
            policy.accumulate(slot, delta * x);
        }
        policy.accumulate(gradient.bias, delta);
    }

    /// Step every weight and the bias through its own optimizer.
    pub fn update<O: Optimizer>(
        &mut self,
        optimizers: &mut UnitOptimizers<O>,
        gradient: UnitGradient<'_>,
    ) {
        for ((weight, optimizer), slot) in self
            .weights
            .iter_mut()
            .zip(optimizers.weights.iter_mut())
            .zip(gradient.weights)
        {
            optimizer.update(weight, slot.load());
        }
        optimizers.bias.update(&mut self.bias, gradient.bias.load());
    }

    /// Copy of the weights and bias.
    pub fn value(&self) -> (Vec<f32>, f32) {
        (self.weights.clone(), self.bias)
    }

    pub fn into_value(self) -> (Vec<f32>, f32) {
        (self.weights, self.bias)
    }

    /// Overwrite weights and bias. Callers check the width beforehand.
    pub fn set_value(&mut self, weights: &[f32], bias: f32) {
        self.weights.copy_from_slice(weights);
        self.bias = bias;
    }
}
