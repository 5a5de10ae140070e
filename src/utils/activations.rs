//! Activation functions for neural networks
//!
//! An activation is a pure elementwise pair: `f(x)` for the forward pass and
//! `df(x)` for its derivative. Both receive the pre-activation value `x`, so layers
//! cache `df(x)` during forward and reuse it during backward.
//!
//! Built-ins:
//! - Identity
//! - ReLU and Leaky ReLU
//! - Sigmoid
//! - Tanh

use std::fmt;
use std::sync::Arc;

/// Elementwise activation strategy consumed by layers.
pub trait Activation: Send + Sync + fmt::Debug {
    /// Forward value at pre-activation `x`.
    fn f(&self, x: f32) -> f32;

    /// Derivative at pre-activation `x`.
    fn df(&self, x: f32) -> f32;

    /// Name used in configuration files.
    fn name(&self) -> &'static str;
}

/// `f(x) = x`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Activation for Identity {
    fn f(&self, x: f32) -> f32 {
        x
    }

    fn df(&self, _x: f32) -> f32 {
        1.0
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Rectified linear unit. The derivative at exactly zero is taken as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl Activation for Relu {
    fn f(&self, x: f32) -> f32 {
        if x > 0.0 {
            x
        } else {
            0.0
        }
    }

    fn df(&self, x: f32) -> f32 {
        if x > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    fn name(&self) -> &'static str {
        "relu"
    }
}

/// Leaky ReLU with slope `alpha` on the negative side.
#[derive(Debug, Clone, Copy)]
pub struct LeakyRelu {
    pub alpha: f32,
}

impl Default for LeakyRelu {
    fn default() -> Self {
        Self { alpha: 0.01 }
    }
}

impl Activation for LeakyRelu {
    fn f(&self, x: f32) -> f32 {
        if x > 0.0 {
            x
        } else {
            self.alpha * x
        }
    }

    fn df(&self, x: f32) -> f32 {
        if x > 0.0 {
            1.0
        } else {
            self.alpha
        }
    }

    fn name(&self) -> &'static str {
        "leaky_relu"
    }
}

/// Logistic sigmoid: 1 / (1 + exp(-x)).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn f(&self, x: f32) -> f32 {
        sigmoid(x)
    }

    fn df(&self, x: f32) -> f32 {
        let s = sigmoid(x);
        s * (1.0 - s)
    }

    fn name(&self) -> &'static str {
        "sigmoid"
    }
}

/// Hyperbolic tangent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Activation for Tanh {
    fn f(&self, x: f32) -> f32 {
        x.tanh()
    }

    fn df(&self, x: f32) -> f32 {
        let t = x.tanh();
        1.0 - t * t
    }

    fn name(&self) -> &'static str {
        "tanh"
    }
}

/// Sigmoid activation function.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Valid activation names for configuration files.
pub const ACTIVATION_NAMES: [&str; 5] = ["identity", "relu", "leaky_relu", "sigmoid", "tanh"];

/// Look up a built-in activation by name (case-insensitive).
///
/// `linear` and `none` are accepted as aliases for identity.
pub fn activation_from_name(name: &str) -> Option<Arc<dyn Activation>> {
    let activation: Arc<dyn Activation> = match name.to_ascii_lowercase().as_str() {
        "identity" | "linear" | "none" => Arc::new(Identity),
        "relu" => Arc::new(Relu),
        "leaky_relu" => Arc::new(LeakyRelu::default()),
        "sigmoid" => Arc::new(Sigmoid),
        "tanh" => Arc::new(Tanh),
        _ => return None,
    };
    Some(activation)
}
