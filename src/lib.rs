//! Feed-forward neural network engine
//!
//! This library composes fully connected layers into a network, evaluates it, and
//! trains it by backpropagation with pluggable loss, optimizer, activation and
//! dropout. Every compute entry point runs either sequentially or concurrently over
//! a capped worker pool, with the same results up to floating-point reassociation.
//!
//! # Modules
//!
//! - `layers`: Layer trait, the weighted-sum `Unit`, and Dense / Dropout / Activation layers
//! - `network`: Network composition, forward evaluation and per-sample gradients
//! - `gradient`: Gradient accumulators mirroring the parameter layout
//! - `loss`: Loss trait and mean squared error
//! - `optimizers`: Optimizer trait and implementations (SGD, Momentum, Adam)
//! - `training`: Online, full-batch and mini-batch training regimes
//! - `utils`: Execution policies, atomic accumulation, activations, initialization
//! - `config`: Training configuration structures
//! - `architecture`: Architecture configuration and network building
//! - `error`: Error types
//!
//! # Example
//!
//! ```
//! use feedforward_engine::layers::DenseLayer;
//! use feedforward_engine::loss::Mse;
//! use feedforward_engine::network::Network;
//! use feedforward_engine::optimizers::SGD;
//! use feedforward_engine::training::Trainer;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut network = Network::builder(2)
//!     .layer(DenseLayer::zeros(2, 1).unwrap())
//!     .build()
//!     .unwrap();
//! let mut trainer = Trainer::new(Mse, SGD::new(0.1));
//! let mut rng = StdRng::seed_from_u64(7);
//! trainer
//!     .train_online(&mut network, &[1.0, 0.0], &[1.0], &mut rng)
//!     .unwrap();
//! assert!(network.forward(&[1.0, 0.0])[0] > 0.0);
//! ```

pub mod architecture;
pub mod config;
pub mod error;
pub mod gradient;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optimizers;
pub mod training;
pub mod utils;

pub use error::{ConfigError, NetworkError};
pub use network::{Network, NetworkBuilder, NetworkValue};
pub use training::{Trainer, TrainingReport};
pub use utils::ExecutionMode;
