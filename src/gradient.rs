//! Gradient buffers
//!
//! A gradient buffer mirrors the parameter shape of a network: one weight slot per
//! unit input and one bias slot per unit, per layer. Parameter-free layers get an
//! empty buffer so indices line up with the network's layer list.
//!
//! Buffers are written through an [`ExecutionPolicy`], so they are shared by
//! reference between every sample of a step, and read back only after the step's
//! accumulation phase has completed.

use crate::layers::Layer;
use crate::network::Network;
use crate::utils::atomic::{load_slots, zeroed_slots, AtomicF32};

/// Borrowed view of one unit's gradient slots.
#[derive(Debug, Clone, Copy)]
pub struct UnitGradient<'a> {
    pub weights: &'a [AtomicF32],
    pub bias: &'a AtomicF32,
}

/// Gradient slots for one layer, stored unit-major.
#[derive(Debug, Clone, Default)]
pub struct LayerGradient {
    input_size: usize,
    weights: Vec<AtomicF32>,
    biases: Vec<AtomicF32>,
}

impl LayerGradient {
    /// Zeroed buffer for `units` units of `input_size` inputs each.
    pub fn zeroed(units: usize, input_size: usize) -> Self {
        Self {
            input_size,
            weights: zeroed_slots(units * input_size),
            biases: zeroed_slots(units),
        }
    }

    /// Zeroed buffer shaped like `layer`'s parameters.
    pub fn for_layer(layer: &dyn Layer) -> Self {
        let units = layer.units();
        Self::zeroed(units.len(), units.first().map_or(0, |u| u.input_size()))
    }

    /// Number of units.
    pub fn units(&self) -> usize {
        self.biases.len()
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn is_empty(&self) -> bool {
        self.biases.is_empty()
    }

    /// Slots for unit `index`.
    pub fn unit(&self, index: usize) -> UnitGradient<'_> {
        let start = index * self.input_size;
        UnitGradient {
            weights: &self.weights[start..start + self.input_size],
            bias: &self.biases[index],
        }
    }

    /// Snapshot of the weight gradients, one row per unit.
    pub fn weights(&self) -> Vec<Vec<f32>> {
        if self.input_size == 0 {
            return vec![Vec::new(); self.units()];
        }
        self.weights
            .chunks(self.input_size)
            .map(load_slots)
            .collect()
    }

    /// Snapshot of the bias gradients.
    pub fn biases(&self) -> Vec<f32> {
        load_slots(&self.biases)
    }

    /// Reset every slot to zero.
    pub fn clear(&self) {
        for slot in self.weights.iter().chain(&self.biases) {
            slot.store(0.0);
        }
    }
}

/// Gradient slots for every layer of a network.
#[derive(Debug, Clone, Default)]
pub struct NetworkGradient {
    layers: Vec<LayerGradient>,
}

impl NetworkGradient {
    /// Zeroed buffer shaped like `network`'s parameters.
    pub fn for_network(network: &Network) -> Self {
        Self {
            layers: network
                .layers()
                .iter()
                .map(|layer| LayerGradient::for_layer(layer.as_ref()))
                .collect(),
        }
    }

    pub fn layer(&self, index: usize) -> &LayerGradient {
        &self.layers[index]
    }

    pub fn layers(&self) -> &[LayerGradient] {
        &self.layers
    }

    /// Reset every slot to zero.
    pub fn clear(&self) {
        self.layers.iter().for_each(LayerGradient::clear);
    }
}
