//! Architecture configuration structures
//!
//! This module provides configuration structures for defining network architectures
//! via JSON configuration files, so a network can be changed without code changes.

use crate::error::ConfigError;
use crate::layers::{ActivationLayer, DenseLayer, DropoutLayer, Layer};
use crate::network::Network;
use crate::utils::activations::{activation_from_name, ACTIVATION_NAMES};
use crate::utils::rng::Init;
use rand::Rng;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Configuration for a single layer in the network.
///
/// Defines the layer type and its parameters. Different layer types require different fields:
///
/// - **Dense**: Requires `output_size`; optional `input_size` (checked against the
///   chain), `activation`, `keep_rate`, `init` (`"zeros"`, `"normal"`, `"xavier"`,
///   `"he"`; `"normal"` also needs `mean` and `std_dev`)
/// - **Dropout**: Requires `keep_rate` (probability of keeping a value, range (0.0, 1.0));
///   optional `size`
/// - **Activation**: Requires `activation`; optional `size`
///
/// # Examples
///
/// ```json
/// {
///   "layer_type": "dense",
///   "output_size": 10,
///   "activation": "relu",
///   "init": "he"
/// }
/// ```
///
/// ```json
/// {
///   "layer_type": "dropout",
///   "keep_rate": 0.5
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "dense", "dropout" or "activation"
    pub layer_type: String,

    // Dense layer parameters
    /// Input size for Dense layer, must match the previous layer if given
    pub input_size: Option<usize>,
    /// Output size for Dense layer
    pub output_size: Option<usize>,
    /// Weight initialization for Dense layer (default: "xavier")
    pub init: Option<String>,
    /// Mean of the "normal" initialization
    pub mean: Option<f32>,
    /// Standard deviation of the "normal" initialization
    pub std_dev: Option<f32>,

    // Shared parameters
    /// Activation name for Dense and Activation layers
    pub activation: Option<String>,
    /// Keep rate for Dropout layers and for dropout on Dense layers
    pub keep_rate: Option<f32>,
    /// Width for Dropout and Activation layers, must match the previous layer if given
    pub size: Option<usize>,
}

/// Configuration for the entire network architecture.
///
/// Layers are applied in the order they appear in the configuration.
///
/// # Example
///
/// ```json
/// {
///   "input_size": 3,
///   "layers": [
///     { "layer_type": "dense", "output_size": 10, "activation": "relu", "init": "he" },
///     { "layer_type": "dropout", "keep_rate": 0.5 },
///     { "layer_type": "dense", "output_size": 1, "activation": "sigmoid" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureConfig {
    /// Width of the network input
    pub input_size: usize,
    /// Sequence of layer configurations defining the network structure
    pub layers: Vec<LayerConfig>,
}

impl ArchitectureConfig {
    /// Width of the network output.
    pub fn output_size(&self) -> Result<usize, ConfigError> {
        self.layers
            .iter()
            .enumerate()
            .try_fold(self.input_size, |width, (i, layer)| {
                get_layer_output_size(layer, width, i)
            })
    }
}

/// Loads an architecture configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it and validates the layer chain.
///
/// # Examples
///
/// ```no_run
/// use feedforward_engine::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/xor_dropout.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture(path: impl AsRef<Path>) -> Result<ArchitectureConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_architecture(&contents)
}

/// Parses and validates an architecture configuration from a JSON string.
pub fn parse_architecture(contents: &str) -> Result<ArchitectureConfig, ConfigError> {
    let config: ArchitectureConfig = serde_json::from_str(contents)?;
    validate_architecture(&config)?;
    Ok(config)
}

/// Output width of a layer given the width flowing into it.
fn get_layer_output_size(
    layer: &LayerConfig,
    width: usize,
    index: usize,
) -> Result<usize, ConfigError> {
    let declared = match layer.layer_type.to_lowercase().as_str() {
        "dense" => layer.input_size,
        _ => layer.size,
    };
    if let Some(declared) = declared {
        if declared != width {
            return Err(ConfigError::invalid(format!(
                "Layer connection mismatch: Layer {} input size ({}) does not match incoming width ({})",
                index, declared, width
            )));
        }
    }
    match layer.layer_type.to_lowercase().as_str() {
        "dense" => layer.output_size.ok_or_else(|| {
            ConfigError::invalid(format!("Layer {}: Dense layer requires 'output_size'", index))
        }),
        "dropout" | "activation" => Ok(width),
        _ => Err(ConfigError::invalid(format!(
            "Layer {}: Unknown layer type: {}",
            index, layer.layer_type
        ))),
    }
}

/// Validates an architecture configuration.
///
/// Checks that:
/// - The input width is positive and there is at least one layer
/// - Each layer has the required fields for its type
/// - Parameter values are within valid ranges
/// - Layer connections are valid (declared input widths match the running width)
fn validate_architecture(config: &ArchitectureConfig) -> Result<(), ConfigError> {
    if config.input_size == 0 {
        return Err(ConfigError::invalid("input_size must be greater than 0"));
    }
    if config.layers.is_empty() {
        return Err(ConfigError::invalid(
            "Architecture must have at least one layer",
        ));
    }
    for (i, layer) in config.layers.iter().enumerate() {
        validate_layer(layer, i)?;
    }
    config.output_size()?;
    Ok(())
}

/// Validates a single layer configuration.
fn validate_layer(layer: &LayerConfig, index: usize) -> Result<(), ConfigError> {
    if let Some(name) = &layer.activation {
        if activation_from_name(name).is_none() {
            return Err(ConfigError::invalid(format!(
                "Layer {}: Invalid activation function '{}'. Must be one of: {}",
                index,
                name,
                ACTIVATION_NAMES.join(", ")
            )));
        }
    }
    if let Some(keep_rate) = layer.keep_rate {
        if !(keep_rate > 0.0 && keep_rate < 1.0) {
            return Err(ConfigError::invalid(format!(
                "Layer {}: keep_rate must be in range (0.0, 1.0)",
                index
            )));
        }
    }

    match layer.layer_type.to_lowercase().as_str() {
        "dense" => {
            match layer.output_size {
                None => {
                    return Err(ConfigError::invalid(format!(
                        "Layer {}: Dense layer requires 'output_size'",
                        index
                    )))
                }
                Some(0) => {
                    return Err(ConfigError::invalid(format!(
                        "Layer {}: output_size must be greater than 0",
                        index
                    )))
                }
                Some(_) => {}
            }
            layer_init(layer, index)?.validate()?;
        }
        "dropout" => {
            if layer.keep_rate.is_none() {
                return Err(ConfigError::invalid(format!(
                    "Layer {}: Dropout layer requires 'keep_rate'",
                    index
                )));
            }
        }
        "activation" => {
            if layer.activation.is_none() {
                return Err(ConfigError::invalid(format!(
                    "Layer {}: Activation layer requires 'activation'",
                    index
                )));
            }
        }
        _ => {
            return Err(ConfigError::invalid(format!(
                "Layer {}: Invalid layer type '{}'. Must be one of: dense, dropout, activation",
                index, layer.layer_type
            )));
        }
    }

    Ok(())
}

/// Weight initialization named by a dense layer configuration.
fn layer_init(layer: &LayerConfig, index: usize) -> Result<Init, ConfigError> {
    let name = match &layer.init {
        None => return Ok(Init::default()),
        Some(name) => name.to_lowercase(),
    };
    if name == "normal" {
        return match (layer.mean, layer.std_dev) {
            (Some(mean), Some(std_dev)) => Ok(Init::Normal { mean, std_dev }),
            _ => Err(ConfigError::invalid(format!(
                "Layer {}: normal initialization requires 'mean' and 'std_dev'",
                index
            ))),
        };
    }
    Init::from_name(&name).ok_or_else(|| {
        ConfigError::invalid(format!(
            "Layer {}: Invalid init '{}'. Must be one of: zeros, normal, xavier, he",
            index, name
        ))
    })
}

/// Builds a network from an architecture configuration.
///
/// Each dense layer draws its initial weights from `rng`.
///
/// # Examples
///
/// ```
/// use feedforward_engine::architecture::{build_network, parse_architecture};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let config = parse_architecture(
///     r#"{"input_size": 2, "layers": [{"layer_type": "dense", "output_size": 1}]}"#,
/// )
/// .unwrap();
/// let network = build_network(&config, &mut StdRng::seed_from_u64(0)).unwrap();
/// assert_eq!(network.output_size(), 1);
/// ```
pub fn build_network<R: Rng + ?Sized>(
    config: &ArchitectureConfig,
    rng: &mut R,
) -> Result<Network, ConfigError> {
    validate_architecture(config)?;
    let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(config.layers.len());
    let mut width = config.input_size;

    for (index, layer_config) in config.layers.iter().enumerate() {
        let activation = layer_config.activation.as_deref().and_then(activation_from_name);
        let layer: Box<dyn Layer> = match layer_config.layer_type.to_lowercase().as_str() {
            "dense" => {
                let output_size = get_layer_output_size(layer_config, width, index)?;
                let init = layer_init(layer_config, index)?;
                let mut dense = DenseLayer::random(width, output_size, &init, rng)?;
                if let Some(activation) = activation {
                    dense = dense.with_shared_activation(activation);
                }
                if let Some(keep_rate) = layer_config.keep_rate {
                    dense = dense.with_dropout(keep_rate)?;
                }
                Box::new(dense)
            }
            "dropout" => {
                let keep_rate = layer_config.keep_rate.ok_or_else(|| {
                    ConfigError::invalid(format!("Layer {}: Dropout layer requires 'keep_rate'", index))
                })?;
                Box::new(DropoutLayer::new(width, keep_rate)?)
            }
            "activation" => {
                let activation = activation.ok_or_else(|| {
                    ConfigError::invalid(format!(
                        "Layer {}: Activation layer requires 'activation'",
                        index
                    ))
                })?;
                Box::new(ActivationLayer::shared(width, activation))
            }
            other => {
                return Err(ConfigError::invalid(format!(
                    "Layer {}: Unknown layer type: {}",
                    index, other
                )))
            }
        };
        width = layer.output_size();
        layers.push(layer);
    }

    Ok(Network::from_layers(layers)?)
}
