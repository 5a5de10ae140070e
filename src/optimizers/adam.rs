//! Adam (Adaptive Moment Estimation) optimizer implementation
//!
//! This module provides the Adam optimizer, which combines momentum and
//! adaptive learning rates with bias correction for improved convergence.

use crate::optimizers::Optimizer;

pub const DEFAULT_LEARNING_RATE: f32 = 0.001;
pub const DEFAULT_BETA1: f32 = 0.9;
pub const DEFAULT_BETA2: f32 = 0.999;
pub const DEFAULT_EPSILON: f32 = 1e-7;

/// Adam (Adaptive Moment Estimation) optimizer for a single parameter.
///
/// Adam maintains two moving averages for the parameter it owns:
///
/// 1. First moment (mean) of gradients (momentum)
/// 2. Second moment (uncentered variance) of gradients (adaptive learning rate)
///
/// The update rule is:
///
/// ```text
/// m_t = β1 * m_{t-1} + (1 - β1) * gradient
/// v_t = β2 * v_{t-1} + (1 - β2) * gradient²
/// m_hat = m_t / (1 - β1^t)
/// v_hat = v_t / (1 - β2^t)
/// parameter = parameter - α * m_hat / (√v_hat + ε)
/// ```
///
/// `β1^t` and `β2^t` are tracked as running products rather than recomputed with
/// `powi` on every step.
///
/// # Fields
///
/// * `learning_rate` - The step size for parameter updates (α)
/// * `beta1` - Exponential decay rate for first moment estimates (typically 0.9)
/// * `beta2` - Exponential decay rate for second moment estimates (typically 0.999)
/// * `epsilon` - Small constant for numerical stability (1e-7 by default)
///
/// # Reference
///
/// Kingma, D. P., & Ba, J. (2014). Adam: A method for stochastic optimization.
/// arXiv preprint arXiv:1412.6980.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    /// First moment estimate
    m: f32,
    /// Second moment estimate
    v: f32,
    /// β1^t for the next step
    beta1_power: f32,
    /// β2^t for the next step
    beta2_power: f32,
}

impl Adam {
    /// Creates a new Adam optimizer with the specified hyperparameters.
    ///
    /// # Arguments
    ///
    /// * `learning_rate` - The step size for parameter updates (α, must be positive)
    /// * `beta1` - Exponential decay rate for first moment estimates (0 < β1 < 1)
    /// * `beta2` - Exponential decay rate for second moment estimates (0 < β2 < 1)
    /// * `epsilon` - Small constant for numerical stability (must be positive)
    ///
    /// # Examples
    ///
    /// ```
    /// use feedforward_engine::optimizers::{Adam, Optimizer};
    ///
    /// let optimizer = Adam::new(0.001, 0.9, 0.999, 1e-7);
    /// assert_eq!(optimizer.learning_rate(), 0.001);
    /// ```
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            m: 0.0,
            v: 0.0,
            beta1_power: beta1,
            beta2_power: beta2,
        }
    }

    pub fn beta1(&self) -> f32 {
        self.beta1
    }

    pub fn beta2(&self) -> f32 {
        self.beta2
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Current first and second moment estimates.
    pub fn moments(&self) -> (f32, f32) {
        (self.m, self.v)
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(
            DEFAULT_LEARNING_RATE,
            DEFAULT_BETA1,
            DEFAULT_BETA2,
            DEFAULT_EPSILON,
        )
    }
}

impl Optimizer for Adam {
    fn update(&mut self, parameter: &mut f32, gradient: f32) {
        self.m = self.beta1 * self.m + (1.0 - self.beta1) * gradient;
        self.v = self.beta2 * self.v + (1.0 - self.beta2) * gradient * gradient;

        let m_hat = self.m / (1.0 - self.beta1_power);
        let v_hat = self.v / (1.0 - self.beta2_power);
        *parameter -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);

        self.beta1_power *= self.beta1;
        self.beta2_power *= self.beta2;
    }

    /// Clears both moments and restarts bias correction.
    fn reset(&mut self) {
        self.m = 0.0;
        self.v = 0.0;
        self.beta1_power = self.beta1;
        self.beta2_power = self.beta2;
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}
