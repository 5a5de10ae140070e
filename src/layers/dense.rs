//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer built from [`Unit`]s: each output is one unit's
//! weighted sum over the whole input, optionally followed by an activation and by
//! inverted dropout.

use crate::error::NetworkError;
use crate::gradient::LayerGradient;
use crate::layers::dropout::{apply_mask, check_keep_rate, gate_delta};
use crate::layers::r#trait::{Layer, LayerCache, Pass};
use crate::layers::unit::Unit;
use crate::network::LayerValue;
use crate::utils::activations::Activation;
use crate::utils::atomic::{zeroed_slots, AtomicF32};
use crate::utils::parallel::ExecutionPolicy;
use crate::utils::rng::Init;
use rand::Rng;
use std::sync::Arc;

/// Dense (fully connected) layer.
///
/// Performs `y = act(Wx + b)` where row `j` of `W` and `b[j]` belong to unit `j`.
///
/// # Fields
///
/// * `input_size` - Number of input features
/// * `units` - One unit per output feature
/// * `activation` - Elementwise activation, `None` for a linear layer
/// * `keep_rate` - Inverted dropout applied to the activated output during training
///
/// # Example
///
/// ```
/// use feedforward_engine::layers::{DenseLayer, Layer};
/// use feedforward_engine::utils::{Init, Relu};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let layer = DenseLayer::random(784, 512, &Init::He, &mut rng)
///     .unwrap()
///     .with_activation(Relu);
/// assert_eq!(layer.input_size(), 784);
/// assert_eq!(layer.output_size(), 512);
/// ```
#[derive(Debug, Clone)]
pub struct DenseLayer {
    input_size: usize,
    units: Vec<Unit>,
    activation: Option<Arc<dyn Activation>>,
    keep_rate: Option<f32>,
}

impl DenseLayer {
    /// Create a layer from explicit units.
    ///
    /// # Errors
    ///
    /// Returns an error when `units` is empty or the units disagree on input width.
    pub fn new(units: Vec<Unit>) -> Result<Self, NetworkError> {
        let input_size = match units.first() {
            Some(unit) => unit.input_size(),
            None => return Err(NetworkError::ZeroWidth { layer: 0 }),
        };
        if let Some(unit) = units.iter().find(|u| u.input_size() != input_size) {
            return Err(NetworkError::ValueShape {
                layer: 0,
                reason: format!(
                    "units disagree on input width ({} vs {})",
                    input_size,
                    unit.input_size()
                ),
            });
        }
        Ok(Self {
            input_size,
            units,
            activation: None,
            keep_rate: None,
        })
    }

    /// Create a layer with all weights and biases zero.
    pub fn zeros(input_size: usize, output_size: usize) -> Result<Self, NetworkError> {
        check_widths(input_size, output_size)?;
        Self::new((0..output_size).map(|_| Unit::zeros(input_size)).collect())
    }

    /// Create a layer with weights sampled from `init`.
    pub fn random<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        init: &Init,
        rng: &mut R,
    ) -> Result<Self, NetworkError> {
        check_widths(input_size, output_size)?;
        let units = (0..output_size)
            .map(|_| {
                init.sample_unit(input_size, output_size, rng)
                    .map(|(weights, bias)| Unit::new(weights, bias))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(units)
    }

    /// Create a linear layer from an extracted value.
    pub fn from_value(value: &LayerValue) -> Result<Self, NetworkError> {
        let input_size = value.weights.first().map_or(0, Vec::len);
        check_widths(input_size, value.biases.len())?;
        value.check_shape(0, value.biases.len(), input_size)?;
        Self::new(
            value
                .weights
                .iter()
                .zip(&value.biases)
                .map(|(weights, &bias)| Unit::new(weights.clone(), bias))
                .collect(),
        )
    }

    /// Attach an activation.
    pub fn with_activation<A: Activation + 'static>(self, activation: A) -> Self {
        self.with_shared_activation(Arc::new(activation))
    }

    /// Attach an activation shared with other layers.
    pub fn with_shared_activation(mut self, activation: Arc<dyn Activation>) -> Self {
        self.activation = Some(activation);
        self
    }

    /// Enable inverted dropout on this layer's output.
    pub fn with_dropout(mut self, keep_rate: f32) -> Result<Self, NetworkError> {
        check_keep_rate(keep_rate)?;
        self.keep_rate = Some(keep_rate);
        Ok(self)
    }

    pub fn activation(&self) -> Option<&dyn Activation> {
        self.activation.as_deref()
    }

    pub fn keep_rate(&self) -> Option<f32> {
        self.keep_rate
    }
}

fn check_widths(input_size: usize, output_size: usize) -> Result<(), NetworkError> {
    if input_size == 0 || output_size == 0 {
        return Err(NetworkError::ZeroWidth { layer: 0 });
    }
    Ok(())
}

impl Layer for DenseLayer {
    fn kind(&self) -> &'static str {
        "dense"
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.units.len()
    }

    fn units(&self) -> &[Unit] {
        &self.units
    }

    fn units_mut(&mut self) -> &mut [Unit] {
        &mut self.units
    }

    fn forward(
        &self,
        input: &[f32],
        pass: &mut Pass<'_>,
        policy: ExecutionPolicy,
    ) -> (Vec<f32>, LayerCache) {
        assert_eq!(input.len(), self.input_size, "dense input width mismatch");
        let sums = policy.map_indices(self.units.len(), |j| self.units[j].forward(input));

        let (mut output, derivative) = match &self.activation {
            Some(act) => {
                let derivative = pass
                    .is_training()
                    .then(|| sums.iter().map(|&x| act.df(x)).collect::<Vec<f32>>());
                let output: Vec<f32> = sums.iter().map(|&x| act.f(x)).collect();
                (output, derivative)
            }
            None => (sums, None),
        };

        if let (Some(keep_rate), Some(rng)) = (self.keep_rate, pass.rng()) {
            apply_mask(&mut output, keep_rate, rng);
        }
        (output, LayerCache { derivative })
    }

    fn local_delta(&self, output: &[f32], output_delta: &[f32], cache: &LayerCache) -> Vec<f32> {
        let mut delta = match self.keep_rate {
            Some(_) => gate_delta(output, output_delta),
            None => output_delta.to_vec(),
        };
        if let Some(derivative) = &cache.derivative {
            for (d, df) in delta.iter_mut().zip(derivative) {
                *d *= df;
            }
        }
        delta
    }

    fn backward(&self, delta: &[f32], policy: ExecutionPolicy) -> Vec<f32> {
        let result = zeroed_slots(self.input_size);
        policy.for_each_index(self.units.len(), |j| {
            self.units[j].backward(delta[j], &result, policy);
        });
        result.into_iter().map(AtomicF32::into_inner).collect()
    }

    fn calc_gradient(
        &self,
        input: &[f32],
        delta: &[f32],
        gradient: &LayerGradient,
        policy: ExecutionPolicy,
    ) {
        policy.for_each_index(self.units.len(), |j| {
            Unit::calc_gradient(input, delta[j], gradient.unit(j), policy);
        });
    }

    fn into_value(self: Box<Self>) -> LayerValue {
        let (weights, biases) = self.units.into_iter().map(Unit::into_value).unzip();
        LayerValue { weights, biases }
    }
}
