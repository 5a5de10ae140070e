use feedforward_engine::architecture::{build_network, load_architecture};
use feedforward_engine::config::{load_config, Regime, TrainingConfig};
use feedforward_engine::loss::Mse;
use feedforward_engine::network::Network;
use feedforward_engine::optimizers::adam::{DEFAULT_BETA1, DEFAULT_BETA2, DEFAULT_EPSILON};
use feedforward_engine::optimizers::{Adam, AnyOptimizer};
use feedforward_engine::training::{Trainer, TrainingReport};
use feedforward_engine::utils::{ExecutionMode, Init, Relu, Sigmoid};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::env;
use std::error::Error;
use std::process;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// XOR over the first two inputs, third input acts as a distractor.
const INPUTS: [[f32; 3]; 4] = [[1.0, 1.0, 1.0], [0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 1.0]];
const TEACHERS: [[f32; 1]; 4] = [[0.0], [0.0], [1.0], [1.0]];

// Defaults used when no configuration files are given.
const HIDDEN: usize = 10;
const KEEP_RATE: f32 = 0.5;
const LEARNING_RATE: f32 = 0.01;
const STEPS: usize = 1000;
const SEED: u64 = 42;

// Default network: 3 -> 10 ReLU + dropout -> 1 sigmoid.
fn default_network(rng: &mut StdRng) -> Result<Network, Box<dyn Error>> {
    let network = Network::builder(3)
        .dense(HIDDEN, Relu, Init::He, rng)
        .dropout(KEEP_RATE)
        .dense(1, Sigmoid, Init::Xavier, rng)
        .build()?;
    Ok(network)
}

fn print_outputs(label: &str, network: &Network) -> f32 {
    println!("{}:", label);
    let mut total_error = 0.0f32;
    for (input, teacher) in INPUTS.iter().zip(TEACHERS.iter()) {
        let output = network.forward(input);
        total_error += (output[0] - teacher[0]).abs();
        println!("  {:?} -> {:.4} (expected {})", input, output[0], teacher[0]);
    }
    println!("  total absolute error: {:.4}", total_error);
    total_error
}

fn train(
    network: &mut Network,
    config: Option<&TrainingConfig>,
    rng: &mut StdRng,
) -> Result<TrainingReport, Box<dyn Error>> {
    let (optimizer, mode) = match config {
        Some(config) => (config.optimizer()?, config.execution_mode()?),
        None => (
            AnyOptimizer::Adam(Adam::new(
                LEARNING_RATE,
                DEFAULT_BETA1,
                DEFAULT_BETA2,
                DEFAULT_EPSILON,
            )),
            ExecutionMode::Sequential,
        ),
    };

    let mut trainer = Trainer::new(Mse, optimizer)
        .with_mode(mode)
        .with_observer(|loss, step| {
            if step % 100 == 0 {
                println!("  step {:4}  loss {:.6}", step, loss);
            }
        });
    if let Some(max_threads) = config.and_then(|c| c.max_threads) {
        trainer = trainer.with_max_threads(max_threads);
    }

    let report = match config {
        None => trainer.train_minibatch(network, &INPUTS, &TEACHERS, INPUTS.len(), STEPS, rng)?,
        Some(config) => match config.regime {
            Regime::Online => {
                let mut report = TrainingReport::default();
                for _ in 0..config.epochs() {
                    for (input, teacher) in INPUTS.iter().zip(TEACHERS.iter()) {
                        let step = trainer.train_online(network, input, teacher, rng)?;
                        report.steps += step.steps;
                        report.samples_seen += step.samples_seen;
                        report.losses.extend(step.losses);
                    }
                }
                report
            }
            Regime::Batch => {
                trainer.train_batch(network, &INPUTS, &TEACHERS, config.epochs(), rng)?
            }
            Regime::Minibatch => {
                let batch_size = config.batch_size.unwrap_or(INPUTS.len());
                trainer.train_minibatch(
                    network,
                    &INPUTS,
                    &TEACHERS,
                    batch_size,
                    config.epochs(),
                    rng,
                )?
            }
        },
    };
    Ok(report)
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let config = match args.get(2) {
        Some(path) => Some(load_config(path)?),
        None => None,
    };
    let seed = config.as_ref().and_then(|c| c.seed).unwrap_or(SEED);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut network = match args.get(1) {
        Some(path) => {
            println!("Loading architecture from {}", path);
            build_network(&load_architecture(path)?, &mut rng)?
        }
        None => default_network(&mut rng)?,
    };
    println!(
        "Network: {} -> {} ({} layers, {} parameters)",
        network.input_size(),
        network.output_size(),
        network.depth(),
        network.parameter_count()
    );

    let before = print_outputs("Before training", &network);

    println!("Training...");
    let train_start = Instant::now();
    let report = train(&mut network, config.as_ref(), &mut rng)?;
    println!(
        "Training time: {:.2} seconds ({} steps)",
        train_start.elapsed().as_secs_f64(),
        report.steps
    );

    let after = print_outputs("After training", &network);
    println!("Error reduced from {:.4} to {:.4}", before, after);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
