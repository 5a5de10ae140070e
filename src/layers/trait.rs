//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types implement. A
//! network is an ordered list of boxed layers, so the trait is object-safe and every
//! method receives the execution policy chosen for the current call.
//!
//! Per-sample state never lives inside a layer. Forward returns a [`LayerCache`]
//! alongside its output, the network keeps it on a tape indexed by layer position,
//! and hands it back during backward. That keeps layers `Sync` and lets many samples
//! run through the same layer at once.

use crate::error::NetworkError;
use crate::gradient::LayerGradient;
use crate::layers::unit::Unit;
use crate::network::LayerValue;
use crate::utils::parallel::ExecutionPolicy;
use rand::RngCore;
use std::fmt;

/// Whether a forward call is for inference or training.
///
/// Training passes carry the random source used for dropout masks.
pub enum Pass<'a> {
    Inference,
    Training(&'a mut dyn RngCore),
}

impl<'a> Pass<'a> {
    pub fn is_training(&self) -> bool {
        matches!(self, Pass::Training(_))
    }

    /// The training random source, if any.
    pub fn rng(&mut self) -> Option<&mut (dyn RngCore + 'a)> {
        match self {
            Pass::Training(rng) => Some(&mut **rng),
            Pass::Inference => None,
        }
    }
}

impl fmt::Debug for Pass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Inference => f.write_str("Inference"),
            Pass::Training(_) => f.write_str("Training"),
        }
    }
}

/// Values cached by a training forward pass for use in backward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerCache {
    /// Activation derivative at each output, when the layer has an activation.
    pub derivative: Option<Vec<f32>>,
}

/// Core trait for neural network layers.
///
/// Backward is split in two steps:
/// 1. [`Layer::local_delta`] turns the gradient w.r.t. the layer output into the
///    gradient w.r.t. the units' weighted sums (dropout gate, activation derivative).
/// 2. [`Layer::backward`] and [`Layer::calc_gradient`] both consume that local delta.
///    They are independent of each other and the network may run them concurrently.
pub trait Layer: Send + Sync + fmt::Debug {
    /// Short name of the layer kind ("dense", "dropout", "activation").
    fn kind(&self) -> &'static str;

    /// Number of input features.
    fn input_size(&self) -> usize;

    /// Number of output features.
    fn output_size(&self) -> usize;

    /// Parametric units, empty for parameter-free layers.
    fn units(&self) -> &[Unit] {
        &[]
    }

    /// Mutable access to the parametric units.
    fn units_mut(&mut self) -> &mut [Unit] {
        &mut []
    }

    /// Number of trainable parameters (weights plus biases).
    fn parameter_count(&self) -> usize {
        self.units().iter().map(|u| u.input_size() + 1).sum()
    }

    /// Forward propagation.
    ///
    /// # Panics
    ///
    /// Panics if `input.len() != self.input_size()`.
    fn forward(
        &self,
        input: &[f32],
        pass: &mut Pass<'_>,
        policy: ExecutionPolicy,
    ) -> (Vec<f32>, LayerCache);

    /// Inference forward, no cache and no randomness.
    fn infer(&self, input: &[f32], policy: ExecutionPolicy) -> Vec<f32> {
        self.forward(input, &mut Pass::Inference, policy).0
    }

    /// Map the gradient w.r.t. this layer's output onto its weighted sums.
    ///
    /// `output` is the value this layer produced in the matching forward pass.
    fn local_delta(&self, output: &[f32], output_delta: &[f32], cache: &LayerCache) -> Vec<f32>;

    /// Gradient w.r.t. the layer input, given the local delta.
    fn backward(&self, delta: &[f32], policy: ExecutionPolicy) -> Vec<f32>;

    /// Accumulate parameter gradients for one sample into `gradient`.
    fn calc_gradient(
        &self,
        _input: &[f32],
        _delta: &[f32],
        _gradient: &LayerGradient,
        _policy: ExecutionPolicy,
    ) {
    }

    /// Copy out the current weights and biases.
    fn value(&self) -> LayerValue {
        LayerValue::from_units(self.units())
    }

    /// Move out the current weights and biases.
    fn into_value(self: Box<Self>) -> LayerValue;

    /// Overwrite weights and biases from `value`; `index` is used for error reporting.
    fn restore(&mut self, index: usize, value: &LayerValue) -> Result<(), NetworkError> {
        let units = self.units_mut();
        value.check_shape(index, units.len(), units.first().map_or(0, Unit::input_size))?;
        for (unit, (weights, bias)) in units
            .iter_mut()
            .zip(value.weights.iter().zip(value.biases.iter()))
        {
            unit.set_value(weights, *bias);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pass_training_exposes_rng() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pass = Pass::Training(&mut rng);
        assert!(pass.is_training());
        assert!(pass.rng().is_some());
    }

    #[test]
    fn test_pass_inference_has_no_rng() {
        let mut pass = Pass::Inference;
        assert!(!pass.is_training());
        assert!(pass.rng().is_none());
        assert_eq!(format!("{:?}", pass), "Inference");
    }
}
