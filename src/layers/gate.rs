//! Multi-input gate
//!
//! A gate is a unit whose weights are split into groups, one per predecessor that
//! feeds it, with a single shared bias. Callers declare at call time which groups
//! are present with an [`InputGroups`] bitmask. Forward and gradient accumulation
//! only touch present groups; absent groups contribute nothing.
//!
//! Inputs and backward buffers are always passed for the present groups only, in
//! ascending group order.

use crate::error::NetworkError;
use crate::optimizers::Optimizer;
use crate::utils::atomic::{load_slots, zeroed_slots, AtomicF32};
use crate::utils::parallel::ExecutionPolicy;

/// Set of present input groups, bit `i` for group `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputGroups(u32);

impl InputGroups {
    /// Largest number of groups a gate can have.
    pub const MAX_GROUPS: usize = 32;

    pub const NONE: InputGroups = InputGroups(0);

    /// The first `count` groups.
    pub fn all(count: usize) -> Self {
        if count >= Self::MAX_GROUPS {
            InputGroups(u32::MAX)
        } else {
            InputGroups((1u32 << count) - 1)
        }
    }

    /// Only group `index`.
    pub fn only(index: usize) -> Self {
        Self::NONE.with(index)
    }

    /// This set plus group `index`.
    pub fn with(self, index: usize) -> Self {
        assert!(index < Self::MAX_GROUPS, "group index out of range");
        InputGroups(self.0 | (1 << index))
    }

    /// This set minus group `index`.
    pub fn without(self, index: usize) -> Self {
        assert!(index < Self::MAX_GROUPS, "group index out of range");
        InputGroups(self.0 & !(1 << index))
    }

    pub fn contains(&self, index: usize) -> bool {
        index < Self::MAX_GROUPS && self.0 & (1 << index) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Present group indices below `count`, ascending.
    pub fn iter(self, count: usize) -> impl Iterator<Item = usize> {
        (0..count.min(Self::MAX_GROUPS)).filter(move |&i| self.contains(i))
    }
}

/// Gradient slots for a gate: one slot per group weight plus the bias.
#[derive(Debug, Clone, Default)]
pub struct GateGradient {
    pub groups: Vec<Vec<AtomicF32>>,
    pub bias: AtomicF32,
}

impl GateGradient {
    /// Snapshot of the weight gradients per group.
    pub fn weights(&self) -> Vec<Vec<f32>> {
        self.groups.iter().map(|g| load_slots(g)).collect()
    }

    pub fn bias(&self) -> f32 {
        self.bias.load()
    }
}

/// Per-parameter optimizers for a gate.
#[derive(Debug, Clone)]
pub struct GateOptimizers<O> {
    pub groups: Vec<Vec<O>>,
    pub bias: O,
}

/// Unit with grouped inputs and a shared bias.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    groups: Vec<Vec<f32>>,
    bias: f32,
}

impl Gate {
    /// Create a gate from per-group weights.
    ///
    /// # Errors
    ///
    /// Returns an error when there are no groups, more than
    /// [`InputGroups::MAX_GROUPS`] groups, or an empty group.
    pub fn new(groups: Vec<Vec<f32>>, bias: f32) -> Result<Self, NetworkError> {
        if groups.is_empty() || groups.len() > InputGroups::MAX_GROUPS {
            return Err(NetworkError::ValueShape {
                layer: 0,
                reason: format!(
                    "gate needs between 1 and {} groups, got {}",
                    InputGroups::MAX_GROUPS,
                    groups.len()
                ),
            });
        }
        if let Some(index) = groups.iter().position(Vec::is_empty) {
            return Err(NetworkError::ZeroWidth { layer: index });
        }
        Ok(Self { groups, bias })
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Width of each group.
    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }

    pub fn weights(&self, group: usize) -> &[f32] {
        &self.groups[group]
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Every group.
    pub fn all_groups(&self) -> InputGroups {
        InputGroups::all(self.groups.len())
    }

    /// Zeroed gradient buffer shaped like this gate.
    pub fn gradient(&self) -> GateGradient {
        GateGradient {
            groups: self.groups.iter().map(|g| zeroed_slots(g.len())).collect(),
            bias: AtomicF32::default(),
        }
    }

    /// Optimizer bank cloned from `prototype`.
    pub fn optimizers<O: Optimizer>(&self, prototype: &O) -> GateOptimizers<O> {
        GateOptimizers {
            groups: self
                .groups
                .iter()
                .map(|g| vec![prototype.clone(); g.len()])
                .collect(),
            bias: prototype.clone(),
        }
    }

    /// Zeroed backward buffers for the groups in `present`.
    pub fn backward_buffers(&self, present: InputGroups) -> Vec<Vec<AtomicF32>> {
        present
            .iter(self.groups.len())
            .map(|i| zeroed_slots(self.groups[i].len()))
            .collect()
    }

    fn check_present(&self, present: InputGroups, supplied: usize) {
        assert!(!present.is_empty(), "gate called with no input groups");
        assert!(
            present.iter(InputGroups::MAX_GROUPS).all(|i| i < self.groups.len()),
            "gate group out of range"
        );
        assert_eq!(present.len(), supplied, "gate group count mismatch");
    }

    /// Weighted sum over the present groups plus the bias.
    pub fn forward(&self, inputs: &[&[f32]], present: InputGroups) -> f32 {
        self.check_present(present, inputs.len());
        present
            .iter(self.groups.len())
            .zip(inputs)
            .map(|(group, input)| {
                let weights = &self.groups[group];
                assert_eq!(input.len(), weights.len(), "gate input width mismatch");
                weights.iter().zip(*input).map(|(w, x)| w * x).sum::<f32>()
            })
            .sum::<f32>()
            + self.bias
    }

    /// Add `delta · w` into the buffer of every present group.
    pub fn backward(
        &self,
        delta: f32,
        present: InputGroups,
        results: &[Vec<AtomicF32>],
        policy: ExecutionPolicy,
    ) {
        self.check_present(present, results.len());
        for (group, result) in present.iter(self.groups.len()).zip(results) {
            for (slot, w) in result.iter().zip(&self.groups[group]) {
                policy.accumulate(slot, delta * w);
            }
        }
    }

    /// Accumulate `delta · x` for present groups and `delta` for the bias.
    pub fn calc_gradient(
        &self,
        inputs: &[&[f32]],
        delta: f32,
        present: InputGroups,
        gradient: &GateGradient,
        policy: ExecutionPolicy,
    ) {
        self.check_present(present, inputs.len());
        policy.accumulate(&gradient.bias, delta);
        for (group, input) in present.iter(self.groups.len()).zip(inputs) {
            for (slot, x) in gradient.groups[group].iter().zip(*input) {
                policy.accumulate(slot, delta * x);
            }
        }
    }

    /// Step every weight and the bias through its own optimizer.
    pub fn update<O: Optimizer>(&mut self, optimizers: &mut GateOptimizers<O>, gradient: &GateGradient) {
        optimizers.bias.update(&mut self.bias, gradient.bias.load());
        for ((weights, bank), slots) in self
            .groups
            .iter_mut()
            .zip(optimizers.groups.iter_mut())
            .zip(&gradient.groups)
        {
            for ((w, optimizer), slot) in weights.iter_mut().zip(bank.iter_mut()).zip(slots) {
                optimizer.update(w, slot.load());
            }
        }
    }
}
