//! Random sources: weight initialization and per-sample generators
//!
//! The engine never owns or seeds a generator of its own. Callers pass any
//! [`rand::Rng`]; it is used for initial weight sampling, dropout masks and
//! mini-batch index sampling.
//!
//! Concurrent training cannot share one `&mut` generator between threads, so
//! [`derive_rngs`] draws one seed per sample from the caller's generator, in sample
//! order, before the work fans out. Sequential training uses the same derivation,
//! which keeps dropout masks identical across execution modes.

use crate::error::NetworkError;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Weight initialization distribution for a dense layer.
///
/// `Zeros`, `Xavier` and `He` initialize biases to zero. `Normal` draws biases from
/// the same distribution as the weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Init {
    /// All weights and biases zero.
    Zeros,
    /// Normal distribution with caller-specified mean and standard deviation.
    Normal { mean: f32, std_dev: f32 },
    /// Xavier/Glorot uniform in `[-limit, limit)`, `limit = sqrt(6 / (fan_in + fan_out))`.
    #[default]
    Xavier,
    /// He normal with `std_dev = sqrt(2 / fan_in)`.
    He,
}

impl Init {
    /// Check the distribution parameters.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if let Init::Normal { mean, std_dev } = *self {
            if !mean.is_finite() {
                return Err(NetworkError::InvalidDistribution(format!(
                    "mean must be finite, got {}",
                    mean
                )));
            }
            // rand_distr only rejects a non-finite std_dev
            if !std_dev.is_finite() || std_dev < 0.0 {
                return Err(NetworkError::InvalidDistribution(format!(
                    "std_dev must be finite and non-negative, got {}",
                    std_dev
                )));
            }
        }
        Ok(())
    }

    /// Sample one unit's parameters: `fan_in` weights and a bias.
    pub fn sample_unit<R: Rng + ?Sized>(
        &self,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Result<(Vec<f32>, f32), NetworkError> {
        match *self {
            Init::Zeros => Ok((vec![0.0; fan_in], 0.0)),
            Init::Normal { mean, std_dev } => {
                self.validate()?;
                let normal = Normal::new(mean, std_dev)
                    .map_err(|e| NetworkError::InvalidDistribution(e.to_string()))?;
                let weights = (0..fan_in).map(|_| normal.sample(rng)).collect();
                Ok((weights, normal.sample(rng)))
            }
            Init::Xavier => {
                let limit = (6.0f32 / (fan_in + fan_out) as f32).sqrt();
                let weights = (0..fan_in).map(|_| rng.gen_range(-limit..limit)).collect();
                Ok((weights, 0.0))
            }
            Init::He => {
                let std_dev = (2.0f32 / fan_in as f32).sqrt();
                let normal = Normal::new(0.0, std_dev)
                    .map_err(|e| NetworkError::InvalidDistribution(e.to_string()))?;
                let weights = (0..fan_in).map(|_| normal.sample(rng)).collect();
                Ok((weights, 0.0))
            }
        }
    }

    /// Parse an initialization name as used in configuration files.
    ///
    /// `normal` needs explicit parameters and is handled by the caller.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "zeros" | "zero" => Some(Init::Zeros),
            "xavier" | "glorot" => Some(Init::Xavier),
            "he" | "kaiming" => Some(Init::He),
            _ => None,
        }
    }
}

/// Derive `count` independent generators from the caller's generator.
pub fn derive_rngs<R: RngCore + ?Sized>(rng: &mut R, count: usize) -> Vec<StdRng> {
    (0..count)
        .map(|_| StdRng::seed_from_u64(rng.next_u64()))
        .collect()
}
