//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait, the weighted-sum [`Unit`] every parametric
//! layer is built from, and the concrete layer kinds a network is composed of.

mod r#trait;
pub mod activation;
pub mod dense;
pub mod dropout;
pub mod gate;
pub mod unit;

// Re-export the Layer trait for convenience
pub use activation::ActivationLayer;
pub use dense::DenseLayer;
pub use dropout::DropoutLayer;
pub use gate::{Gate, GateGradient, GateOptimizers, InputGroups};
pub use r#trait::{Layer, LayerCache, Pass};
pub use unit::Unit;
