//! Stochastic Gradient Descent (SGD) optimizer implementation
//!
//! This module provides a vanilla SGD optimizer that performs the basic
//! gradient descent update: `parameter = parameter - learning_rate * gradient`

use crate::optimizers::Optimizer;

/// Stochastic Gradient Descent optimizer.
///
/// Implements the basic gradient descent update rule without momentum or
/// adaptive learning rates:
///
/// `w = w - η * ∇L/∂w`
///
/// where w is the parameter, η (eta) is the learning rate, and ∇L/∂w is the gradient.
///
/// # Example
///
/// ```
/// use feedforward_engine::optimizers::{Optimizer, SGD};
///
/// let mut optimizer = SGD::new(0.1);
/// let mut weight = 1.0f32;
/// optimizer.update(&mut weight, 0.1);
/// assert!((weight - 0.99).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SGD {
    learning_rate: f32,
}

impl SGD {
    /// Creates a new SGD optimizer with the specified learning rate.
    ///
    /// # Typical Values
    ///
    /// Common learning rates range from 0.001 to 0.1, depending on the problem.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for SGD {
    fn update(&mut self, parameter: &mut f32, gradient: f32) {
        *parameter -= self.learning_rate * gradient;
    }

    fn reset(&mut self) {}

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}
