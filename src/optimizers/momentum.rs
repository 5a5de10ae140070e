//! SGD with momentum

use crate::optimizers::Optimizer;

/// Gradient descent with a velocity term.
///
/// ```text
/// v = μ * v + η * gradient
/// w = w - v
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    learning_rate: f32,
    momentum: f32,
    velocity: f32,
}

impl Momentum {
    pub fn new(learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: 0.0,
        }
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    /// Current velocity.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }
}

impl Optimizer for Momentum {
    fn update(&mut self, parameter: &mut f32, gradient: f32) {
        self.velocity = self.momentum * self.velocity + self.learning_rate * gradient;
        *parameter -= self.velocity;
    }

    fn reset(&mut self) {
        self.velocity = 0.0;
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}
