//! Network composition, forward evaluation and gradient computation
//!
//! A [`Network`] is an ordered chain of boxed [`Layer`]s whose widths line up:
//! layer `i`'s output width equals layer `i + 1`'s input width. The chain is checked
//! by [`NetworkBuilder::build`], so a `Network` value is always well-shaped and the
//! numeric methods below never return errors.
//!
//! # Gradient computation
//!
//! [`Network::accumulate_gradient`] runs one sample:
//!
//! 1. Forward, left to right, recording each layer's input and [`LayerCache`] on a
//!    tape indexed by layer position.
//! 2. Loss value and loss gradient at the output.
//! 3. Backward, right to left. Each layer turns the incoming delta into its local
//!    delta, then two independent jobs consume it: accumulating the layer's parameter
//!    gradients and computing the delta for the previous layer. In concurrent mode the
//!    two are forked and joined before moving on. The first layer only accumulates.

use crate::error::NetworkError;
use crate::gradient::NetworkGradient;
use crate::layers::{ActivationLayer, DenseLayer, DropoutLayer, Layer, LayerCache, Pass, Unit};
use crate::loss::Loss;
use crate::optimizers::{NetworkOptimizers, Optimizer};
use crate::utils::activations::Activation;
use crate::utils::parallel::{ExecutionMode, ExecutionPolicy};
use crate::utils::rng::Init;
use rand::{Rng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Weights and biases of one layer: one weight row and one bias per unit.
///
/// Parameter-free layers have an empty value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerValue {
    pub weights: Vec<Vec<f32>>,
    pub biases: Vec<f32>,
}

impl LayerValue {
    /// Copy the parameters of `units`.
    pub fn from_units(units: &[Unit]) -> Self {
        let (weights, biases) = units.iter().map(Unit::value).unzip();
        Self { weights, biases }
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty() && self.biases.is_empty()
    }

    /// Check that this value fits `units` units of `input_size` inputs each.
    pub fn check_shape(
        &self,
        layer: usize,
        units: usize,
        input_size: usize,
    ) -> Result<(), NetworkError> {
        if self.weights.len() != units || self.biases.len() != units {
            return Err(NetworkError::ValueShape {
                layer,
                reason: format!(
                    "expected {} units, found {} weight rows and {} biases",
                    units,
                    self.weights.len(),
                    self.biases.len()
                ),
            });
        }
        if let Some(row) = self.weights.iter().position(|w| w.len() != input_size) {
            return Err(NetworkError::ValueShape {
                layer,
                reason: format!(
                    "unit {} has {} weights, expected {}",
                    row,
                    self.weights[row].len(),
                    input_size
                ),
            });
        }
        Ok(())
    }
}

/// Weights and biases of every layer, in layer order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkValue {
    pub layers: Vec<LayerValue>,
}

/// Ordered chain of shape-compatible layers.
#[derive(Debug)]
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
}

impl Network {
    /// Start composing a network that consumes `input_size` features.
    pub fn builder(input_size: usize) -> NetworkBuilder {
        NetworkBuilder::new(input_size)
    }

    /// Compose a network from already-built layers.
    pub fn from_layers(layers: Vec<Box<dyn Layer>>) -> Result<Self, NetworkError> {
        let input_size = match layers.first() {
            Some(layer) => layer.input_size(),
            None => return Err(NetworkError::EmptyNetwork),
        };
        layers
            .into_iter()
            .fold(NetworkBuilder::new(input_size), NetworkBuilder::boxed)
            .build()
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    /// Number of layers.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> &dyn Layer {
        self.layers[index].as_ref()
    }

    /// Inference forward pass, sequential.
    ///
    /// # Panics
    ///
    /// Panics if `input.len() != self.input_size()`.
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.forward_with(input, ExecutionMode::Sequential)
    }

    /// Inference forward pass under `mode`.
    ///
    /// Concurrent mode fans out across units inside each layer on the global rayon
    /// pool. Results equal the sequential ones up to float rounding.
    pub fn forward_with(&self, input: &[f32], mode: ExecutionMode) -> Vec<f32> {
        assert_eq!(input.len(), self.input_size(), "network input width mismatch");
        let policy = mode.policy();
        self.layers
            .iter()
            .fold(input.to_vec(), |x, layer| layer.infer(&x, policy))
    }

    /// Copy out the parameters of every layer.
    pub fn value(&self) -> NetworkValue {
        NetworkValue {
            layers: self.layers.iter().map(|layer| layer.value()).collect(),
        }
    }

    /// Consume the network and move out its parameters.
    pub fn into_value(self) -> NetworkValue {
        NetworkValue {
            layers: self.layers.into_iter().map(|layer| layer.into_value()).collect(),
        }
    }

    /// Overwrite every layer's parameters from `value`.
    ///
    /// The whole value is checked before any layer is touched, so a failed restore
    /// leaves the network unchanged.
    pub fn restore(&mut self, value: &NetworkValue) -> Result<(), NetworkError> {
        if value.layers.len() != self.layers.len() {
            return Err(NetworkError::ValueShape {
                layer: value.layers.len().min(self.layers.len()),
                reason: format!(
                    "expected {} layers, found {}",
                    self.layers.len(),
                    value.layers.len()
                ),
            });
        }
        for (index, (layer, layer_value)) in self.layers.iter().zip(&value.layers).enumerate() {
            let units = layer.units();
            layer_value.check_shape(index, units.len(), units.first().map_or(0, Unit::input_size))?;
        }
        for (index, (layer, layer_value)) in self.layers.iter_mut().zip(&value.layers).enumerate() {
            layer.restore(index, layer_value)?;
        }
        Ok(())
    }

    /// Run one training sample and add its parameter gradients into `gradients`.
    ///
    /// Returns the sample's loss. `rng` drives dropout masks. `gradients` may be
    /// shared with other samples running at the same time when `policy` is
    /// concurrent.
    ///
    /// # Panics
    ///
    /// Panics if `input` or `teacher` do not match the network's widths.
    pub fn accumulate_gradient<L: Loss + ?Sized>(
        &self,
        input: &[f32],
        teacher: &[f32],
        loss: &L,
        gradients: &NetworkGradient,
        rng: &mut dyn RngCore,
        policy: ExecutionPolicy,
    ) -> f32 {
        assert_eq!(input.len(), self.input_size(), "network input width mismatch");
        assert_eq!(teacher.len(), self.output_size(), "network teacher width mismatch");

        let depth = self.layers.len();
        let mut inputs: Vec<Vec<f32>> = Vec::with_capacity(depth);
        let mut caches: Vec<LayerCache> = Vec::with_capacity(depth);
        let mut pass = Pass::Training(rng);
        let mut x = input.to_vec();
        for layer in &self.layers {
            let (output, cache) = layer.forward(&x, &mut pass, policy);
            inputs.push(std::mem::replace(&mut x, output));
            caches.push(cache);
        }

        let sample_loss = loss.f(teacher, &x);
        let mut delta = loss.df(teacher, &x);
        let mut output = x;

        for index in (0..depth).rev() {
            let layer = self.layers[index].as_ref();
            let layer_input = &inputs[index];
            let local = layer.local_delta(&output, &delta, &caches[index]);
            let gradient = gradients.layer(index);

            if index == 0 {
                layer.calc_gradient(layer_input, &local, gradient, policy);
                break;
            }

            let (previous, ()) = policy.join(
                || layer.backward(&local, policy),
                || layer.calc_gradient(layer_input, &local, gradient, policy),
            );
            delta = previous;
            output = inputs.pop().unwrap_or_default();
        }

        sample_loss
    }

    /// Apply one optimizer step to every layer using the accumulated `gradients`.
    ///
    /// In concurrent mode every layer updates as its own task; the call returns only
    /// after all of them have finished.
    pub fn update<O: Optimizer>(
        &mut self,
        optimizers: &mut NetworkOptimizers<O>,
        gradients: &NetworkGradient,
        policy: ExecutionPolicy,
    ) {
        let banks = optimizers.layers_mut();
        match policy.mode() {
            ExecutionMode::Sequential => {
                for (index, (layer, bank)) in self.layers.iter_mut().zip(banks.iter_mut()).enumerate() {
                    bank.step(layer.units_mut(), gradients.layer(index), policy);
                }
            }
            ExecutionMode::Concurrent => {
                self.layers
                    .par_iter_mut()
                    .zip(banks.par_iter_mut())
                    .enumerate()
                    .for_each(|(index, (layer, bank))| {
                        bank.step(layer.units_mut(), gradients.layer(index), policy);
                    });
            }
        }
    }
}

/// Incremental, shape-checked network composition.
///
/// Each added layer's input width is compared with the current chain width. The
/// first mismatch is recorded and returned from [`NetworkBuilder::build`]; later
/// additions are ignored.
///
/// # Example
///
/// ```
/// use feedforward_engine::network::Network;
/// use feedforward_engine::utils::{Init, Relu, Sigmoid};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let network = Network::builder(3)
///     .dense(10, Relu, Init::He, &mut rng)
///     .dropout(0.5)
///     .dense(1, Sigmoid, Init::Xavier, &mut rng)
///     .build()
///     .unwrap();
/// assert_eq!(network.output_size(), 1);
/// ```
#[derive(Debug)]
pub struct NetworkBuilder {
    input_size: usize,
    width: usize,
    layers: Vec<Box<dyn Layer>>,
    error: Option<NetworkError>,
}

impl NetworkBuilder {
    pub fn new(input_size: usize) -> Self {
        let error = (input_size == 0).then_some(NetworkError::ZeroWidth { layer: 0 });
        Self {
            input_size,
            width: input_size,
            layers: Vec::new(),
            error,
        }
    }

    /// Current width at the end of the chain.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of layers added so far.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Append a layer.
    pub fn layer<L: Layer + 'static>(self, layer: L) -> Self {
        self.boxed(Box::new(layer))
    }

    /// Append an already boxed layer.
    pub fn boxed(mut self, layer: Box<dyn Layer>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let index = self.layers.len();
        if layer.input_size() != self.width {
            self.error = Some(NetworkError::ShapeMismatch {
                layer: index,
                expected: self.width,
                found: layer.input_size(),
            });
            return self;
        }
        if layer.output_size() == 0 {
            self.error = Some(NetworkError::ZeroWidth { layer: index });
            return self;
        }
        self.width = layer.output_size();
        self.layers.push(layer);
        self
    }

    /// Append a randomly initialized dense layer with `outputs` units.
    pub fn dense<A, R>(self, outputs: usize, activation: A, init: Init, rng: &mut R) -> Self
    where
        A: Activation + 'static,
        R: Rng + ?Sized,
    {
        let activation: Arc<dyn Activation> = Arc::new(activation);
        self.dense_shared(outputs, Some(activation), init, rng)
    }

    /// Append a randomly initialized dense layer, optionally without activation.
    pub fn dense_shared<R: Rng + ?Sized>(
        mut self,
        outputs: usize,
        activation: Option<Arc<dyn Activation>>,
        init: Init,
        rng: &mut R,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        match DenseLayer::random(self.width, outputs, &init, rng) {
            Ok(layer) => {
                let layer = match activation {
                    Some(activation) => layer.with_shared_activation(activation),
                    None => layer,
                };
                self.layer(layer)
            }
            Err(err) => {
                self.error = Some(reindex(err, self.layers.len()));
                self
            }
        }
    }

    /// Append a dropout layer at the current width.
    pub fn dropout(mut self, keep_rate: f32) -> Self {
        if self.error.is_some() {
            return self;
        }
        match DropoutLayer::new(self.width, keep_rate) {
            Ok(layer) => self.layer(layer),
            Err(err) => {
                self.error = Some(err);
                self
            }
        }
    }

    /// Append a parameter-free activation layer at the current width.
    pub fn activation<A: Activation + 'static>(self, activation: A) -> Self {
        let width = self.width;
        self.layer(ActivationLayer::new(width, activation))
    }

    /// Finish composition.
    ///
    /// # Errors
    ///
    /// Returns the first composition error, or [`NetworkError::EmptyNetwork`] when no
    /// layer was added.
    pub fn build(self) -> Result<Network, NetworkError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.layers.is_empty() {
            return Err(NetworkError::EmptyNetwork);
        }
        tracing::debug!(
            input_size = self.input_size,
            output_size = self.width,
            depth = self.layers.len(),
            "network composed"
        );
        Ok(Network {
            layers: self.layers,
        })
    }
}

/// Attach the layer position to errors raised by standalone layer constructors.
fn reindex(err: NetworkError, index: usize) -> NetworkError {
    match err {
        NetworkError::ZeroWidth { .. } => NetworkError::ZeroWidth { layer: index },
        NetworkError::ValueShape { reason, .. } => NetworkError::ValueShape {
            layer: index,
            reason,
        },
        other => other,
    }
}
