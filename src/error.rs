//! Error types
//!
//! Numeric code (forward, backward, gradient accumulation, update) never fails.
//! Everything here is raised either while a network is being composed, while a
//! training call validates its dataset, or while configuration files are loaded.

use thiserror::Error;

/// Errors raised while composing a network or starting a training call.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("network must contain at least one layer")]
    EmptyNetwork,

    #[error("layer {layer}: expected input width {expected}, found {found}")]
    ShapeMismatch {
        layer: usize,
        expected: usize,
        found: usize,
    },

    #[error("layer {layer}: widths must be greater than zero")]
    ZeroWidth { layer: usize },

    #[error("keep rate must lie strictly between 0 and 1, got {0}")]
    InvalidKeepRate(f32),

    #[error("invalid weight distribution: {0}")]
    InvalidDistribution(String),

    #[error("layer {layer}: parameter value does not match layer shape ({reason})")]
    ValueShape { layer: usize, reason: String },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("dataset has {inputs} inputs but {teachers} teachers")]
    DatasetMismatch { inputs: usize, teachers: usize },

    #[error("sample {index}: expected width {expected}, found {found}")]
    SampleShape {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("batch size {batch_size} must be between 1 and the sample count {samples}")]
    InvalidBatchSize { batch_size: usize, samples: usize },

    #[error("failed to start worker pool: {0}")]
    Scheduler(#[from] rayon::ThreadPoolBuildError),
}

/// Errors raised while loading architecture or training configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}
