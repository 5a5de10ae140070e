//! Parameter-free elementwise activation layer

use crate::layers::r#trait::{Layer, LayerCache, Pass};
use crate::network::LayerValue;
use crate::utils::activations::Activation;
use crate::utils::parallel::ExecutionPolicy;
use std::sync::Arc;

/// Applies an activation to every input, without weights.
#[derive(Debug, Clone)]
pub struct ActivationLayer {
    size: usize,
    activation: Arc<dyn Activation>,
}

impl ActivationLayer {
    pub fn new<A: Activation + 'static>(size: usize, activation: A) -> Self {
        Self::shared(size, Arc::new(activation))
    }

    pub fn shared(size: usize, activation: Arc<dyn Activation>) -> Self {
        Self { size, activation }
    }

    pub fn activation(&self) -> &dyn Activation {
        self.activation.as_ref()
    }
}

impl Layer for ActivationLayer {
    fn kind(&self) -> &'static str {
        "activation"
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }

    fn forward(
        &self,
        input: &[f32],
        pass: &mut Pass<'_>,
        _policy: ExecutionPolicy,
    ) -> (Vec<f32>, LayerCache) {
        assert_eq!(input.len(), self.size, "activation input width mismatch");
        let output = input.iter().map(|&x| self.activation.f(x)).collect();
        let derivative = pass
            .is_training()
            .then(|| input.iter().map(|&x| self.activation.df(x)).collect());
        (output, LayerCache { derivative })
    }

    fn local_delta(&self, _output: &[f32], output_delta: &[f32], cache: &LayerCache) -> Vec<f32> {
        match &cache.derivative {
            Some(derivative) => output_delta
                .iter()
                .zip(derivative)
                .map(|(d, df)| d * df)
                .collect(),
            None => output_delta.to_vec(),
        }
    }

    fn backward(&self, delta: &[f32], _policy: ExecutionPolicy) -> Vec<f32> {
        delta.to_vec()
    }

    fn into_value(self: Box<Self>) -> LayerValue {
        LayerValue::default()
    }
}
