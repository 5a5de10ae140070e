//! Configuration structures for training
//!
//! This module provides configuration structures for setting up a training run:
//! execution mode, training regime and optimizer settings.

use crate::error::ConfigError;
use crate::optimizers::adam::{DEFAULT_BETA1, DEFAULT_BETA2, DEFAULT_EPSILON};
use crate::optimizers::{Adam, AnyOptimizer, Momentum, SGD};
use crate::utils::ExecutionMode;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const DEFAULT_EPOCHS: usize = 1;
const DEFAULT_MOMENTUM: f32 = 0.9;

/// How training samples are grouped into update steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    /// One update per sample.
    Online,
    /// One update per epoch over the whole dataset.
    Batch,
    /// One update per random subset of `batch_size` samples.
    #[default]
    Minibatch,
}

/// Configuration for a training run.
///
/// Different optimizers read different optional fields:
///
/// - **SGD**: `learning_rate`
/// - **Momentum**: `learning_rate`, `momentum` (default 0.9)
/// - **Adam**: `learning_rate`, `beta1`, `beta2`, `epsilon` (defaults 0.9, 0.999, 1e-7)
///
/// # Example
///
/// ```json
/// {
///   "mode": "concurrent",
///   "regime": "minibatch",
///   "epochs": 250,
///   "batch_size": 4,
///   "max_threads": 4,
///   "seed": 42,
///   "optimizer": "adam",
///   "learning_rate": 0.01
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Execution mode: "sequential" or "concurrent" (default "sequential")
    pub mode: Option<String>,

    /// Training regime (default "minibatch")
    #[serde(default)]
    pub regime: Regime,

    /// Number of epochs (default 1)
    pub epochs: Option<usize>,

    /// Samples per mini-batch step, required for the "minibatch" regime
    pub batch_size: Option<usize>,

    /// Upper bound on worker threads in concurrent mode
    pub max_threads: Option<usize>,

    /// Seed for the caller's random generator
    pub seed: Option<u64>,

    /// Optimizer: "sgd", "momentum" or "adam"
    pub optimizer: String,

    /// Learning rate for the optimizer
    pub learning_rate: f32,

    /// Momentum factor for the momentum optimizer
    pub momentum: Option<f32>,

    /// First-moment decay rate for Adam
    pub beta1: Option<f32>,

    /// Second-moment decay rate for Adam
    pub beta2: Option<f32>,

    /// Numerical stability term for Adam
    pub epsilon: Option<f32>,
}

impl TrainingConfig {
    /// Builds the optimizer prototype this configuration names.
    pub fn optimizer(&self) -> Result<AnyOptimizer, ConfigError> {
        match self.optimizer.to_lowercase().as_str() {
            "sgd" => Ok(AnyOptimizer::Sgd(SGD::new(self.learning_rate))),
            "momentum" => Ok(AnyOptimizer::Momentum(Momentum::new(
                self.learning_rate,
                self.momentum.unwrap_or(DEFAULT_MOMENTUM),
            ))),
            "adam" => Ok(AnyOptimizer::Adam(Adam::new(
                self.learning_rate,
                self.beta1.unwrap_or(DEFAULT_BETA1),
                self.beta2.unwrap_or(DEFAULT_BETA2),
                self.epsilon.unwrap_or(DEFAULT_EPSILON),
            ))),
            other => Err(ConfigError::invalid(format!(
                "Invalid optimizer '{}'. Must be one of: sgd, momentum, adam",
                other
            ))),
        }
    }

    /// Execution mode named by this configuration.
    pub fn execution_mode(&self) -> Result<ExecutionMode, ConfigError> {
        match &self.mode {
            None => Ok(ExecutionMode::default()),
            Some(name) => ExecutionMode::from_name(name).ok_or_else(|| {
                ConfigError::invalid(format!(
                    "Invalid mode '{}'. Must be one of: sequential, concurrent",
                    name
                ))
            }),
        }
    }

    pub fn epochs(&self) -> usize {
        self.epochs.unwrap_or(DEFAULT_EPOCHS)
    }
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it and validates every field.
///
/// # Examples
///
/// ```no_run
/// use feedforward_engine::config::load_config;
///
/// let cfg = load_config("config/training/xor_adam.json").unwrap();
/// assert_eq!(cfg.optimizer, "adam");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses and validates a training configuration from a JSON string.
pub fn parse_config(contents: &str) -> Result<TrainingConfig, ConfigError> {
    let config: TrainingConfig = serde_json::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &TrainingConfig) -> Result<(), ConfigError> {
    config.execution_mode()?;
    config.optimizer()?;

    if !(config.learning_rate > 0.0) {
        return Err(ConfigError::invalid("learning_rate must be positive"));
    }

    if config.epochs == Some(0) {
        return Err(ConfigError::invalid("epochs must be greater than 0"));
    }

    if config.max_threads == Some(0) {
        return Err(ConfigError::invalid("max_threads must be greater than 0"));
    }

    match (config.regime, config.batch_size) {
        (Regime::Minibatch, None) => {
            return Err(ConfigError::invalid(
                "batch_size is required for the minibatch regime",
            ))
        }
        (_, Some(0)) => {
            return Err(ConfigError::invalid("batch_size must be greater than 0"));
        }
        _ => {}
    }

    if let Some(momentum) = config.momentum {
        if !(0.0..1.0).contains(&momentum) {
            return Err(ConfigError::invalid("momentum must be in range [0.0, 1.0)"));
        }
    }

    for (name, beta) in [("beta1", config.beta1), ("beta2", config.beta2)] {
        if let Some(beta) = beta {
            if !(0.0..1.0).contains(&beta) {
                return Err(ConfigError::invalid(format!(
                    "{} must be in range [0.0, 1.0)",
                    name
                )));
            }
        }
    }

    if let Some(epsilon) = config.epsilon {
        if epsilon <= 0.0 {
            return Err(ConfigError::invalid("epsilon must be positive"));
        }
    }

    Ok(())
}
