//! Integration tests for network composition and gradient computation
//!
//! This file tests:
//! - Composition-time shape validation
//! - Forward and gradient equivalence between execution modes
//! - Linearity of gradient accumulation across samples
//! - Value extraction and restoration

use approx::assert_relative_eq;
use feedforward_engine::error::NetworkError;
use feedforward_engine::gradient::NetworkGradient;
use feedforward_engine::layers::DenseLayer;
use feedforward_engine::loss::Mse;
use feedforward_engine::network::{Network, NetworkValue};
use feedforward_engine::utils::{ExecutionMode, ExecutionPolicy, Init, Relu, Sigmoid, Tanh};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn deep_network(seed: u64) -> Network {
    let mut rng = StdRng::seed_from_u64(seed);
    Network::builder(6)
        .dense(24, Relu, Init::He, &mut rng)
        .dense(16, Tanh, Init::Xavier, &mut rng)
        .dense(3, Sigmoid, Init::Xavier, &mut rng)
        .build()
        .unwrap()
}

fn sample(seed: u64, width: usize) -> Vec<f32> {
    (0..width)
        .map(|i| ((i as f32 + 1.0) * (seed as f32 + 0.5)).sin())
        .collect()
}

fn flatten(gradients: &NetworkGradient) -> Vec<f32> {
    gradients
        .layers()
        .iter()
        .flat_map(|layer| {
            let mut values: Vec<f32> = layer.weights().into_iter().flatten().collect();
            values.extend(layer.biases());
            values
        })
        .collect()
}

fn gradient_of(network: &Network, samples: &[(Vec<f32>, Vec<f32>)], mode: ExecutionMode) -> Vec<f32> {
    let gradients = NetworkGradient::for_network(network);
    let mut rng = StdRng::seed_from_u64(0);
    for (input, teacher) in samples {
        network.accumulate_gradient(input, teacher, &Mse, &gradients, &mut rng, mode.policy());
    }
    flatten(&gradients)
}

// ============================================================================
// Composition Tests
// ============================================================================

mod composition_tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_rejected_before_network_exists() {
        let result = Network::builder(3)
            .layer(DenseLayer::zeros(3, 10).unwrap())
            .layer(DenseLayer::zeros(9, 1).unwrap())
            .build();
        assert!(matches!(
            result,
            Err(NetworkError::ShapeMismatch {
                layer: 1,
                expected: 10,
                found: 9
            })
        ));
    }

    #[test]
    fn test_first_layer_must_match_input() {
        let result = Network::builder(4)
            .layer(DenseLayer::zeros(3, 2).unwrap())
            .build();
        assert!(matches!(
            result,
            Err(NetworkError::ShapeMismatch { layer: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_keep_rate_rejected() {
        let result = Network::builder(2)
            .layer(DenseLayer::zeros(2, 2).unwrap())
            .dropout(1.5)
            .build();
        assert!(matches!(result, Err(NetworkError::InvalidKeepRate(_))));
    }

    #[test]
    fn test_shape_queries() {
        let network = deep_network(1);
        assert_eq!(network.input_size(), 6);
        assert_eq!(network.output_size(), 3);
        assert_eq!(network.depth(), 3);
        assert_eq!(
            network.parameter_count(),
            6 * 24 + 24 + 24 * 16 + 16 + 16 * 3 + 3
        );
        let kinds: Vec<&str> = network.layers().iter().map(|l| l.kind()).collect();
        assert_eq!(kinds, vec!["dense", "dense", "dense"]);
    }

    #[test]
    fn test_invalid_distribution_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = Network::builder(2)
            .dense(
                2,
                Relu,
                Init::Normal {
                    mean: 0.0,
                    std_dev: -1.0,
                },
                &mut rng,
            )
            .build();
        assert!(matches!(result, Err(NetworkError::InvalidDistribution(_))));
    }
}

// ============================================================================
// Execution Mode Equivalence
// ============================================================================

mod mode_equivalence_tests {
    use super::*;

    #[test]
    fn test_forward_modes_agree() {
        let network = deep_network(2);
        for seed in 0..8 {
            let input = sample(seed, 6);
            let sequential = network.forward_with(&input, ExecutionMode::Sequential);
            let concurrent = network.forward_with(&input, ExecutionMode::Concurrent);
            assert_eq!(sequential, network.forward(&input));
            for (a, b) in sequential.iter().zip(&concurrent) {
                assert_relative_eq!(a, b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_gradient_modes_agree() {
        let network = deep_network(3);
        let samples: Vec<(Vec<f32>, Vec<f32>)> = (0..4)
            .map(|seed| (sample(seed, 6), vec![0.0, 0.5, 1.0]))
            .collect();
        let sequential = gradient_of(&network, &samples, ExecutionMode::Sequential);
        let concurrent = gradient_of(&network, &samples, ExecutionMode::Concurrent);
        assert_eq!(sequential.len(), network.parameter_count());
        for (a, b) in sequential.iter().zip(&concurrent) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_concurrent_samples_share_one_buffer() {
        use rayon::prelude::*;

        let network = deep_network(4);
        let samples: Vec<(Vec<f32>, Vec<f32>)> = (0..16)
            .map(|seed| (sample(seed, 6), vec![1.0, 0.0, 0.5]))
            .collect();
        let expected = gradient_of(&network, &samples, ExecutionMode::Sequential);

        let gradients = NetworkGradient::for_network(&network);
        samples.par_iter().enumerate().for_each(|(i, (input, teacher))| {
            let mut rng = StdRng::seed_from_u64(i as u64);
            network.accumulate_gradient(
                input,
                teacher,
                &Mse,
                &gradients,
                &mut rng,
                ExecutionPolicy::concurrent(),
            );
        });
        for (a, b) in expected.iter().zip(flatten(&gradients).iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-4);
        }
    }
}

// ============================================================================
// Gradient Linearity
// ============================================================================

mod linearity_tests {
    use super::*;

    #[test]
    fn test_accumulation_is_linear() {
        let network = deep_network(5);
        let a = (sample(1, 6), vec![0.2, 0.4, 0.6]);
        let b = (sample(2, 6), vec![0.9, 0.1, 0.3]);

        let together = gradient_of(&network, &[a.clone(), b.clone()], ExecutionMode::Sequential);
        let reversed = gradient_of(&network, &[b.clone(), a.clone()], ExecutionMode::Sequential);
        let only_a = gradient_of(&network, &[a], ExecutionMode::Sequential);
        let only_b = gradient_of(&network, &[b], ExecutionMode::Sequential);

        for i in 0..together.len() {
            assert_relative_eq!(together[i], reversed[i], epsilon = 1e-6);
            assert_relative_eq!(together[i], only_a[i] + only_b[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zero_error_gives_zero_gradient() {
        let network = deep_network(6);
        let input = sample(3, 6);
        let teacher = network.forward(&input);
        let gradient = gradient_of(&network, &[(input, teacher)], ExecutionMode::Sequential);
        assert!(gradient.iter().all(|g| *g == 0.0));
    }

    #[test]
    fn test_clear_resets_buffer() {
        let network = deep_network(7);
        let gradients = NetworkGradient::for_network(&network);
        let mut rng = StdRng::seed_from_u64(0);
        network.accumulate_gradient(
            &sample(0, 6),
            &[1.0, 1.0, 1.0],
            &Mse,
            &gradients,
            &mut rng,
            ExecutionPolicy::sequential(),
        );
        assert!(flatten(&gradients).iter().any(|g| *g != 0.0));
        gradients.clear();
        assert!(flatten(&gradients).iter().all(|g| *g == 0.0));
    }
}

// ============================================================================
// Value Extraction
// ============================================================================

mod value_tests {
    use super::*;

    #[test]
    fn test_restore_copies_parameters() {
        let source = deep_network(8);
        let mut target = deep_network(9);
        let input = sample(4, 6);
        assert_ne!(source.forward(&input), target.forward(&input));

        target.restore(&source.value()).unwrap();
        assert_eq!(source.forward(&input), target.forward(&input));
    }

    #[test]
    fn test_into_value_moves_parameters_out() {
        let network = deep_network(10);
        let copy = network.value();
        let moved = network.into_value();
        assert_eq!(copy, moved);
        assert_eq!(moved.layers.len(), 3);
        assert_eq!(moved.layers[0].weights.len(), 24);
        assert_eq!(moved.layers[0].weights[0].len(), 6);
    }

    #[test]
    fn test_value_serializes_to_json() {
        let network = deep_network(11);
        let json = serde_json::to_string(&network.value()).unwrap();
        let parsed: NetworkValue = serde_json::from_str(&json).unwrap();
        let mut restored = deep_network(12);
        restored.restore(&parsed).unwrap();
        let input = sample(5, 6);
        for (a, b) in network.forward(&input).iter().zip(&restored.forward(&input)) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_restore_rejects_layer_count_mismatch() {
        let mut network = deep_network(13);
        let mut value = network.value();
        value.layers.pop();
        assert!(network.restore(&value).is_err());
    }
}
