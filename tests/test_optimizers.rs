//! Integration tests for optimizers and optimizer banks
//!
//! Covers the per-scalar update rules of SGD, Momentum and Adam, runtime
//! selection through `AnyOptimizer`, and layer/network banks applying a
//! gradient in both execution modes.

use approx::assert_relative_eq;
use feedforward_engine::gradient::NetworkGradient;
use feedforward_engine::layers::{DenseLayer, Unit};
use feedforward_engine::loss::Mse;
use feedforward_engine::network::Network;
use feedforward_engine::optimizers::{
    Adam, AnyOptimizer, Momentum, NetworkOptimizers, Optimizer, SGD,
};
use feedforward_engine::utils::{ExecutionMode, ExecutionPolicy};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Minimize f(w) = (w - 3)² with the given optimizer.
fn minimize<O: Optimizer>(mut optimizer: O, steps: usize) -> f32 {
    let mut w = 0.0f32;
    for _ in 0..steps {
        let gradient = 2.0 * (w - 3.0);
        optimizer.update(&mut w, gradient);
    }
    w
}

// ============================================================================
// Update Rule Tests
// ============================================================================

mod update_rule_tests {
    use super::*;

    #[test]
    fn test_sgd_step() {
        let mut sgd = SGD::new(0.1);
        let mut w = 1.0f32;
        sgd.update(&mut w, 2.0);
        assert_relative_eq!(w, 0.8, epsilon = 1e-7);
    }

    #[test]
    fn test_momentum_accumulates_velocity() {
        let mut momentum = Momentum::new(0.1, 0.9);
        let mut w = 0.0f32;
        momentum.update(&mut w, 1.0);
        assert_relative_eq!(w, -0.1, epsilon = 1e-7);
        momentum.update(&mut w, 1.0);
        // v = 0.9 * 0.1 + 0.1
        assert_relative_eq!(momentum.velocity(), 0.19, epsilon = 1e-6);
        assert_relative_eq!(w, -0.29, epsilon = 1e-6);
    }

    #[test]
    fn test_adam_first_step_is_learning_rate() {
        let mut adam = Adam::new(0.01, 0.9, 0.999, 1e-7);
        let mut w = 0.0f32;
        adam.update(&mut w, 123.0);
        assert_relative_eq!(w, -0.01, epsilon = 1e-5);
        let (m, v) = adam.moments();
        assert!(m > 0.0 && v > 0.0);
    }

    #[test]
    fn test_all_optimizers_converge() {
        assert_relative_eq!(minimize(SGD::new(0.1), 200), 3.0, epsilon = 1e-3);
        assert_relative_eq!(minimize(Momentum::new(0.05, 0.9), 500), 3.0, epsilon = 1e-2);
        assert_relative_eq!(minimize(Adam::new(0.1, 0.9, 0.999, 1e-7), 2000), 3.0, epsilon = 0.1);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut adam = Adam::default();
        let mut w = 0.0f32;
        adam.update(&mut w, 1.0);
        adam.reset();
        assert_eq!(adam.moments(), (0.0, 0.0));
        let mut fresh_w = 0.0f32;
        let mut fresh = Adam::default();
        fresh.update(&mut fresh_w, 1.0);
        let mut reset_w = 0.0f32;
        adam.update(&mut reset_w, 1.0);
        assert_eq!(fresh_w, reset_w);
    }

    #[test]
    fn test_any_optimizer_delegates() {
        let mut any = AnyOptimizer::Momentum(Momentum::new(0.1, 0.5));
        let mut plain = Momentum::new(0.1, 0.5);
        let (mut a, mut b) = (1.0f32, 1.0f32);
        for g in [1.0, -0.5, 2.0] {
            any.update(&mut a, g);
            plain.update(&mut b, g);
        }
        assert_eq!(a, b);
        assert_eq!(any.learning_rate(), 0.1);
        assert_eq!(any.name(), "momentum");
    }
}

// ============================================================================
// Bank Tests
// ============================================================================

mod bank_tests {
    use super::*;

    fn network() -> Network {
        Network::builder(2)
            .layer(
                DenseLayer::new(vec![
                    Unit::new(vec![0.5, -0.5], 0.1),
                    Unit::new(vec![0.3, 0.8], -0.2),
                ])
                .unwrap(),
            )
            .dropout(0.5)
            .layer(DenseLayer::new(vec![Unit::new(vec![1.0, -1.0], 0.0)]).unwrap())
            .build()
            .unwrap()
    }

    fn gradient(network: &Network) -> NetworkGradient {
        let gradients = NetworkGradient::for_network(network);
        let mut rng = StdRng::seed_from_u64(1);
        network.accumulate_gradient(
            &[1.0, 2.0],
            &[0.5],
            &Mse,
            &gradients,
            &mut rng,
            ExecutionPolicy::sequential(),
        );
        gradients
    }

    #[test]
    fn test_bank_mirrors_parameter_layout() {
        let network = network();
        let bank = NetworkOptimizers::for_network(&network, &SGD::new(0.1));
        assert_eq!(bank.layers().len(), 3);
        assert!(bank.matches(&network));
        assert_eq!(bank.layers()[0].units().len(), 2);
        assert_eq!(bank.layers()[0].units()[1].weights.len(), 2);
        assert!(bank.layers()[1].units().is_empty());
    }

    #[test]
    fn test_sgd_update_subtracts_scaled_gradient() {
        let mut network = network();
        let gradients = gradient(&network);
        let before = network.value();
        let mut bank = NetworkOptimizers::for_network(&network, &SGD::new(0.5));
        network.update(&mut bank, &gradients, ExecutionPolicy::sequential());
        let after = network.value();

        for (index, layer) in gradients.layers().iter().enumerate() {
            let weights = layer.weights();
            for (u, row) in weights.iter().enumerate() {
                for (i, g) in row.iter().enumerate() {
                    assert_relative_eq!(
                        after.layers[index].weights[u][i],
                        before.layers[index].weights[u][i] - 0.5 * g,
                        epsilon = 1e-6
                    );
                }
            }
            for (u, g) in layer.biases().iter().enumerate() {
                assert_relative_eq!(
                    after.layers[index].biases[u],
                    before.layers[index].biases[u] - 0.5 * g,
                    epsilon = 1e-6
                );
            }
        }
    }

    #[test]
    fn test_update_modes_agree() {
        let mut sequential = network();
        let mut concurrent = network();
        let gradients = gradient(&sequential);
        let prototype = Adam::new(0.01, 0.9, 0.999, 1e-7);
        let mut seq_bank = NetworkOptimizers::for_network(&sequential, &prototype);
        let mut par_bank = NetworkOptimizers::for_network(&concurrent, &prototype);
        sequential.update(&mut seq_bank, &gradients, ExecutionMode::Sequential.policy());
        concurrent.update(&mut par_bank, &gradients, ExecutionMode::Concurrent.policy());
        assert_eq!(sequential.value(), concurrent.value());
    }

    #[test]
    fn test_bank_detects_shape_change() {
        let bank = NetworkOptimizers::for_network(&network(), &SGD::new(0.1));
        let other = Network::builder(2)
            .layer(DenseLayer::zeros(2, 3).unwrap())
            .build()
            .unwrap();
        assert!(!bank.matches(&other));
    }
}
