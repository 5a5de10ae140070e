//! Optimizer state banks
//!
//! One optimizer instance per trainable scalar, laid out exactly like the network's
//! parameters. Banks are cloned from a prototype when training starts and persist
//! across training calls until the network shape changes or they are reset.

use crate::gradient::LayerGradient;
use crate::layers::{Layer, Unit};
use crate::network::Network;
use crate::optimizers::Optimizer;
use crate::utils::parallel::{ExecutionMode, ExecutionPolicy};
use rayon::prelude::*;

/// Optimizers for one unit: one per weight plus one for the bias.
#[derive(Debug, Clone)]
pub struct UnitOptimizers<O> {
    pub weights: Vec<O>,
    pub bias: O,
}

impl<O: Optimizer> UnitOptimizers<O> {
    pub fn new(input_size: usize, prototype: &O) -> Self {
        Self {
            weights: vec![prototype.clone(); input_size],
            bias: prototype.clone(),
        }
    }

    pub fn reset(&mut self) {
        self.weights.iter_mut().for_each(O::reset);
        self.bias.reset();
    }
}

/// Optimizers for every unit of one layer. Empty for parameter-free layers.
#[derive(Debug, Clone)]
pub struct LayerOptimizers<O> {
    units: Vec<UnitOptimizers<O>>,
}

impl<O: Optimizer> LayerOptimizers<O> {
    /// Bank shaped like `layer`'s units.
    pub fn for_layer(layer: &dyn Layer, prototype: &O) -> Self {
        Self {
            units: layer
                .units()
                .iter()
                .map(|unit| UnitOptimizers::new(unit.input_size(), prototype))
                .collect(),
        }
    }

    pub fn units(&self) -> &[UnitOptimizers<O>] {
        &self.units
    }

    /// Whether this bank matches the unit layout of `units`.
    pub fn matches(&self, units: &[Unit]) -> bool {
        self.units.len() == units.len()
            && self
                .units
                .iter()
                .zip(units)
                .all(|(bank, unit)| bank.weights.len() == unit.input_size())
    }

    /// Apply one update step to `units` using `gradient`.
    ///
    /// Units are updated in parallel under a concurrent policy; every unit owns its
    /// parameters and optimizers, so there is no shared write.
    pub fn step(&mut self, units: &mut [Unit], gradient: &LayerGradient, policy: ExecutionPolicy) {
        debug_assert!(self.matches(units));
        match policy.mode() {
            ExecutionMode::Sequential => {
                for (index, (unit, bank)) in units.iter_mut().zip(self.units.iter_mut()).enumerate() {
                    unit.update(bank, gradient.unit(index));
                }
            }
            ExecutionMode::Concurrent => {
                units
                    .par_iter_mut()
                    .zip(self.units.par_iter_mut())
                    .enumerate()
                    .for_each(|(index, (unit, bank))| unit.update(bank, gradient.unit(index)));
            }
        }
    }

    pub fn reset(&mut self) {
        self.units.iter_mut().for_each(UnitOptimizers::reset);
    }
}

/// Optimizers for every layer of a network.
#[derive(Debug, Clone)]
pub struct NetworkOptimizers<O> {
    layers: Vec<LayerOptimizers<O>>,
}

impl<O: Optimizer> NetworkOptimizers<O> {
    /// Bank shaped like `network`'s parameters, every slot cloned from `prototype`.
    pub fn for_network(network: &Network, prototype: &O) -> Self {
        Self {
            layers: network
                .layers()
                .iter()
                .map(|layer| LayerOptimizers::for_layer(layer.as_ref(), prototype))
                .collect(),
        }
    }

    pub fn layers(&self) -> &[LayerOptimizers<O>] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [LayerOptimizers<O>] {
        &mut self.layers
    }

    /// Whether this bank still fits `network`.
    pub fn matches(&self, network: &Network) -> bool {
        self.layers.len() == network.depth()
            && self
                .layers
                .iter()
                .zip(network.layers())
                .all(|(bank, layer)| bank.matches(layer.units()))
    }

    /// Total number of optimizer instances.
    pub fn len(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|layer| layer.units.iter())
            .map(|unit| unit.weights.len() + 1)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset every instance without changing the layout.
    pub fn reset(&mut self) {
        self.layers.iter_mut().for_each(LayerOptimizers::reset);
    }
}
