//! Optimizer abstractions for neural network parameter updates
//!
//! This module provides the Optimizer trait and implementations for different
//! optimization algorithms used to update network parameters during training.
//!
//! # Overview
//!
//! An optimizer here is a *per-parameter* state machine: each weight and each bias of
//! every unit gets its own instance, cloned from a prototype. The basic update is
//! `weight = weight - learning_rate * gradient`; stateful optimizers such as Adam keep
//! running moments next to the scalar they update.
//!
//! The instances are grouped into banks ([`UnitOptimizers`], [`LayerOptimizers`],
//! [`NetworkOptimizers`]) that mirror the network's parameter layout.
//!
//! # Available Optimizers
//!
//! - SGD: Vanilla stochastic gradient descent
//! - Momentum: SGD with a velocity term
//! - Adam: Adaptive moment estimation with bias correction
//!
//! # Example
//!
//! ```
//! use feedforward_engine::optimizers::{Adam, Optimizer};
//!
//! let mut optimizer = Adam::default();
//! let mut weight = 1.0f32;
//! optimizer.update(&mut weight, 0.5);
//! assert!(weight < 1.0);
//! ```

pub mod adam;
pub mod momentum;
pub mod sgd;
pub mod state;

pub use adam::Adam;
pub use momentum::Momentum;
pub use sgd::SGD;
pub use state::{LayerOptimizers, NetworkOptimizers, UnitOptimizers};

use std::fmt;

/// Core trait for per-parameter optimizers.
///
/// Implementations are cloned once per trainable scalar, so they must be cheap to
/// clone and `Send` so banks can be updated from worker threads.
pub trait Optimizer: Clone + Send + fmt::Debug {
    /// Move `parameter` using `gradient`, updating any internal state.
    fn update(&mut self, parameter: &mut f32, gradient: f32);

    /// Reset optimizer state.
    ///
    /// For stateless optimizers like vanilla SGD, this is a no-op.
    fn reset(&mut self);

    /// Step size, reported when training starts.
    fn learning_rate(&self) -> f32;
}

/// Runtime-selected optimizer, used when the kind comes from configuration.
#[derive(Debug, Clone)]
pub enum AnyOptimizer {
    Sgd(SGD),
    Momentum(Momentum),
    Adam(Adam),
}

impl AnyOptimizer {
    /// Name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            AnyOptimizer::Sgd(_) => "sgd",
            AnyOptimizer::Momentum(_) => "momentum",
            AnyOptimizer::Adam(_) => "adam",
        }
    }
}

impl Optimizer for AnyOptimizer {
    fn update(&mut self, parameter: &mut f32, gradient: f32) {
        match self {
            AnyOptimizer::Sgd(o) => o.update(parameter, gradient),
            AnyOptimizer::Momentum(o) => o.update(parameter, gradient),
            AnyOptimizer::Adam(o) => o.update(parameter, gradient),
        }
    }

    fn reset(&mut self) {
        match self {
            AnyOptimizer::Sgd(o) => o.reset(),
            AnyOptimizer::Momentum(o) => o.reset(),
            AnyOptimizer::Adam(o) => o.reset(),
        }
    }

    fn learning_rate(&self) -> f32 {
        match self {
            AnyOptimizer::Sgd(o) => o.learning_rate(),
            AnyOptimizer::Momentum(o) => o.learning_rate(),
            AnyOptimizer::Adam(o) => o.learning_rate(),
        }
    }
}
