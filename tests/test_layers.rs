//! Integration tests for units and layers
//!
//! This file covers:
//! - Unit forward, backward and gradient accumulation
//! - Dense layers with and without activation, in both execution modes
//! - Standalone activation layers
//! - Multi-group gates invoked with a subset of their inputs

use approx::assert_relative_eq;
use feedforward_engine::gradient::LayerGradient;
use feedforward_engine::layers::{
    ActivationLayer, DenseLayer, Gate, InputGroups, Layer, LayerCache, Pass, Unit,
};
use feedforward_engine::optimizers::SGD;
use feedforward_engine::utils::atomic::{load_slots, zeroed_slots};
use feedforward_engine::utils::{ExecutionMode, ExecutionPolicy, Init, Relu, Sigmoid, Tanh};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn policies() -> [ExecutionPolicy; 2] {
    [ExecutionPolicy::sequential(), ExecutionPolicy::concurrent()]
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    fn sample_unit() -> Unit {
        Unit::new(vec![1.0, 0.1, 0.01], 1.0)
    }

    #[test]
    fn test_forward_weighted_sum() {
        let unit = sample_unit();
        assert_relative_eq!(unit.forward(&[0.1, 0.2, 0.3]), 1.123, epsilon = 1e-6);
    }

    #[test]
    fn test_backward_scales_weights() {
        for policy in policies() {
            let unit = sample_unit();
            let result = zeroed_slots(3);
            unit.backward(0.1, &result, policy);
            let values = load_slots(&result);
            assert_relative_eq!(values[0], 0.1, epsilon = 1e-7);
            assert_relative_eq!(values[1], 0.01, epsilon = 1e-7);
            assert_relative_eq!(values[2], 0.001, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_calc_gradient() {
        for policy in policies() {
            let gradient = LayerGradient::zeroed(1, 3);
            Unit::calc_gradient(&[0.1, 0.2, 0.3], 0.1, gradient.unit(0), policy);
            let weights = gradient.weights();
            assert_relative_eq!(weights[0][0], 0.01, epsilon = 1e-7);
            assert_relative_eq!(weights[0][1], 0.02, epsilon = 1e-7);
            assert_relative_eq!(weights[0][2], 0.03, epsilon = 1e-7);
            assert_relative_eq!(gradient.biases()[0], 0.1, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_calc_gradient_accumulates() {
        let gradient = LayerGradient::zeroed(1, 3);
        let policy = ExecutionPolicy::sequential();
        Unit::calc_gradient(&[0.1, 0.2, 0.3], 0.1, gradient.unit(0), policy);
        Unit::calc_gradient(&[0.1, 0.2, 0.3], 0.1, gradient.unit(0), policy);
        assert_relative_eq!(gradient.weights()[0][2], 0.06, epsilon = 1e-7);
        assert_relative_eq!(gradient.biases()[0], 0.2, epsilon = 1e-7);
    }

    #[test]
    fn test_sgd_update() {
        let mut unit = sample_unit();
        let mut optimizers =
            feedforward_engine::optimizers::UnitOptimizers::new(3, &SGD::new(1.0));
        let gradient = LayerGradient::zeroed(1, 3);
        Unit::calc_gradient(
            &[0.1, 0.2, 0.3],
            0.1,
            gradient.unit(0),
            ExecutionPolicy::sequential(),
        );
        unit.update(&mut optimizers, gradient.unit(0));
        assert_relative_eq!(unit.weights()[0], 0.99, epsilon = 1e-6);
        assert_relative_eq!(unit.weights()[2], -0.02, epsilon = 1e-6);
        assert_relative_eq!(unit.bias(), 0.9, epsilon = 1e-6);
    }
}

// ============================================================================
// Dense Layer Tests
// ============================================================================

mod dense_tests {
    use super::*;

    fn random_layer(seed: u64) -> DenseLayer {
        let mut rng = StdRng::seed_from_u64(seed);
        DenseLayer::random(8, 32, &Init::Xavier, &mut rng).unwrap()
    }

    #[test]
    fn test_forward_matches_units() {
        let layer = DenseLayer::new(vec![
            Unit::new(vec![1.0, 2.0], 0.5),
            Unit::new(vec![-1.0, 0.0], 0.0),
        ])
        .unwrap();
        let output = layer.infer(&[1.0, 1.0], ExecutionPolicy::sequential());
        assert_eq!(output, vec![3.5, -1.0]);
    }

    #[test]
    fn test_forward_modes_agree() {
        let layer = random_layer(3).with_activation(Tanh);
        let input: Vec<f32> = (0..8).map(|i| i as f32 * 0.1 - 0.3).collect();
        let sequential = layer.infer(&input, ExecutionMode::Sequential.policy());
        let concurrent = layer.infer(&input, ExecutionMode::Concurrent.policy());
        for (a, b) in sequential.iter().zip(&concurrent) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_backward_modes_agree() {
        let layer = random_layer(5);
        let delta: Vec<f32> = (0..32).map(|i| (i as f32 * 0.37).sin()).collect();
        let sequential = layer.backward(&delta, ExecutionPolicy::sequential());
        let concurrent = layer.backward(&delta, ExecutionPolicy::concurrent());
        assert_eq!(sequential.len(), 8);
        for (a, b) in sequential.iter().zip(&concurrent) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_training_forward_caches_derivative() {
        let layer = DenseLayer::new(vec![Unit::new(vec![1.0], -0.5), Unit::new(vec![1.0], 0.5)])
            .unwrap()
            .with_activation(Relu);
        let mut rng = StdRng::seed_from_u64(0);
        let (output, cache) = layer.forward(
            &[0.25],
            &mut Pass::Training(&mut rng),
            ExecutionPolicy::sequential(),
        );
        assert_eq!(output, vec![0.0, 0.75]);
        assert_eq!(cache.derivative, Some(vec![0.0, 1.0]));

        let (_, cache) = layer.forward(&[0.25], &mut Pass::Inference, ExecutionPolicy::sequential());
        assert_eq!(cache, LayerCache::default());
    }

    #[test]
    fn test_local_delta_applies_derivative() {
        let layer = DenseLayer::zeros(1, 2).unwrap().with_activation(Sigmoid);
        let cache = LayerCache {
            derivative: Some(vec![0.25, 0.5]),
        };
        let delta = layer.local_delta(&[0.5, 0.5], &[1.0, 2.0], &cache);
        assert_eq!(delta, vec![0.25, 1.0]);
    }

    #[test]
    fn test_rejects_ragged_units() {
        let result = DenseLayer::new(vec![Unit::new(vec![1.0, 2.0], 0.0), Unit::new(vec![1.0], 0.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_width() {
        assert!(DenseLayer::zeros(0, 3).is_err());
        assert!(DenseLayer::zeros(3, 0).is_err());
    }

    #[test]
    fn test_parameter_count() {
        assert_eq!(random_layer(1).parameter_count(), 8 * 32 + 32);
    }
}

// ============================================================================
// Activation Layer Tests
// ============================================================================

mod activation_layer_tests {
    use super::*;

    #[test]
    fn test_elementwise_transform() {
        let layer = ActivationLayer::new(3, Relu);
        let output = layer.infer(&[-1.0, 0.0, 2.0], ExecutionPolicy::sequential());
        assert_eq!(output, vec![0.0, 0.0, 2.0]);
        assert_eq!(layer.parameter_count(), 0);
        assert!(layer.value().is_empty());
    }

    #[test]
    fn test_backward_through_derivative() {
        let layer = ActivationLayer::new(2, Relu);
        let mut rng = StdRng::seed_from_u64(0);
        let (output, cache) = layer.forward(
            &[-1.0, 3.0],
            &mut Pass::Training(&mut rng),
            ExecutionPolicy::sequential(),
        );
        let local = layer.local_delta(&output, &[5.0, 5.0], &cache);
        assert_eq!(local, vec![0.0, 5.0]);
        assert_eq!(layer.backward(&local, ExecutionPolicy::sequential()), local);
    }
}

// ============================================================================
// Gate Tests
// ============================================================================

mod gate_tests {
    use super::*;

    fn sample_gate() -> Gate {
        Gate::new(vec![vec![1.0, 2.0, 4.0], vec![0.1, 0.2, 0.3, 0.4]], 0.0).unwrap()
    }

    #[test]
    fn test_subset_forward_ignores_absent_groups() {
        let gate = sample_gate();
        let first = [1.0, 1.0, 1.0];
        let second = [1.0, 1.0, 1.0, 1.0];
        assert_relative_eq!(gate.forward(&[&first, &second], gate.all_groups()), 8.0, epsilon = 1e-6);
        assert_relative_eq!(gate.forward(&[&first], InputGroups::only(0)), 7.0, epsilon = 1e-6);
        assert_relative_eq!(gate.forward(&[&second], InputGroups::only(1)), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_subset_gradient_modes_agree() {
        let gate = sample_gate();
        let second = [0.5, -0.5, 1.0, 2.0];
        let sequential = gate.gradient();
        let concurrent = gate.gradient();
        gate.calc_gradient(
            &[&second],
            0.5,
            InputGroups::only(1),
            &sequential,
            ExecutionPolicy::sequential(),
        );
        gate.calc_gradient(
            &[&second],
            0.5,
            InputGroups::only(1),
            &concurrent,
            ExecutionPolicy::concurrent(),
        );
        assert_eq!(sequential.weights(), concurrent.weights());
        assert_eq!(sequential.weights()[0], vec![0.0; 3]);
        assert_relative_eq!(sequential.weights()[1][3], 1.0, epsilon = 1e-7);
    }

    #[test]
    fn test_update_with_sgd() {
        let mut gate = sample_gate();
        let gradient = gate.gradient();
        let first = [1.0, 0.0, 0.0];
        gate.calc_gradient(
            &[&first],
            1.0,
            InputGroups::only(0),
            &gradient,
            ExecutionPolicy::sequential(),
        );
        let mut optimizers = gate.optimizers(&SGD::new(0.5));
        gate.update(&mut optimizers, &gradient);
        assert_relative_eq!(gate.weights(0)[0], 0.5, epsilon = 1e-7);
        assert_relative_eq!(gate.weights(0)[1], 2.0, epsilon = 1e-7);
        assert_relative_eq!(gate.bias(), -0.5, epsilon = 1e-7);
    }
}
