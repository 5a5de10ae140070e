//! Shared utilities for the engine
//!
//! Accumulation slots, execution policies, activation functions and random
//! sources used by layers, the network and the trainer.

pub mod activations;
pub mod atomic;
pub mod parallel;
pub mod rng;

pub use activations::{activation_from_name, Activation, Identity, LeakyRelu, Relu, Sigmoid, Tanh};
pub use atomic::{Accumulate, AtomicAccumulate, AtomicF32, PlainAccumulate};
pub use parallel::{ExecutionMode, ExecutionPolicy, Scheduler};
pub use rng::Init;
