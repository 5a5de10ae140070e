//! Training regimes
//!
//! A [`Trainer`] owns everything a training call needs besides the network and the
//! data: the loss, an optimizer prototype and the per-parameter optimizer bank
//! cloned from it, the execution mode, a capped worker pool and an optional progress
//! observer.
//!
//! Every step follows the same shape:
//!
//! 1. Zero a fresh gradient buffer.
//! 2. Run every sample of the step through [`Network::accumulate_gradient`],
//!    in order (sequential) or fanned out over the pool (concurrent). Per-sample
//!    gradients are summed.
//! 3. Apply one optimizer update to every layer.
//! 4. Report the mean sample loss to the observer.
//!
//! Steps never overlap: the update of step `k` has completed before any sample of
//! step `k + 1` is evaluated.

use crate::error::NetworkError;
use crate::gradient::NetworkGradient;
use crate::loss::Loss;
use crate::network::Network;
use crate::optimizers::{NetworkOptimizers, Optimizer};
use crate::utils::atomic::AtomicF32;
use crate::utils::parallel::{ExecutionMode, ExecutionPolicy, Scheduler};
use crate::utils::rng::derive_rngs;
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Summary of one training call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    /// Number of optimizer updates performed.
    pub steps: usize,
    /// Number of sample evaluations across all steps.
    pub samples_seen: usize,
    /// Mean loss of each step, in step order.
    pub losses: Vec<f32>,
}

impl TrainingReport {
    /// Mean loss of the final step.
    pub fn last_loss(&self) -> Option<f32> {
        self.losses.last().copied()
    }

    /// Mean of the per-step losses in `range` of steps.
    pub fn mean_loss(&self, range: std::ops::Range<usize>) -> Option<f32> {
        let window = self.losses.get(range)?;
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<f32>() / window.len() as f32)
    }
}

type Observer<'a> = Box<dyn FnMut(f32, usize) + 'a>;

/// Drives online, full-batch and mini-batch training of a [`Network`].
///
/// # Example
///
/// ```
/// use feedforward_engine::loss::Mse;
/// use feedforward_engine::network::Network;
/// use feedforward_engine::optimizers::SGD;
/// use feedforward_engine::training::Trainer;
/// use feedforward_engine::utils::{Identity, Init};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let mut network = Network::builder(1)
///     .dense(1, Identity, Init::Zeros, &mut rng)
///     .build()
///     .unwrap();
/// let mut trainer = Trainer::new(Mse, SGD::new(0.1));
/// let report = trainer
///     .train_batch(&mut network, &[[1.0f32]], &[[2.0f32]], 50, &mut rng)
///     .unwrap();
/// assert!(report.last_loss().unwrap() < 0.01);
/// ```
pub struct Trainer<'a, L: Loss, O: Optimizer> {
    loss: L,
    prototype: O,
    mode: ExecutionMode,
    scheduler: Scheduler,
    optimizers: Option<NetworkOptimizers<O>>,
    observer: Option<Observer<'a>>,
}

impl<'a, L: Loss, O: Optimizer> Trainer<'a, L, O> {
    /// Create a sequential trainer.
    pub fn new(loss: L, optimizer: O) -> Self {
        Self {
            loss,
            prototype: optimizer,
            mode: ExecutionMode::Sequential,
            scheduler: Scheduler::default(),
            optimizers: None,
            observer: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Cap the worker pool used in concurrent mode.
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.scheduler = Scheduler::new(Some(max_threads));
        self
    }

    /// Call `observer(mean_loss, step_index)` after every step.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(f32, usize) + 'a,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    pub fn loss(&self) -> &L {
        &self.loss
    }

    pub fn prototype(&self) -> &O {
        &self.prototype
    }

    /// Optimizer bank from previous training calls, if any.
    pub fn optimizers(&self) -> Option<&NetworkOptimizers<O>> {
        self.optimizers.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Discard the optimizer bank; the next step starts from fresh prototype clones.
    pub fn reset_optimizers(&mut self) {
        self.optimizers = None;
    }

    /// One update from a single sample.
    ///
    /// The observer sees step index `0`. Indices are zero-based in every regime, so
    /// an online call reports the same index as the first epoch of
    /// [`Trainer::train_batch`] and the first step of [`Trainer::train_minibatch`].
    pub fn train_online<R: Rng + ?Sized>(
        &mut self,
        network: &mut Network,
        input: &[f32],
        teacher: &[f32],
        rng: &mut R,
    ) -> Result<TrainingReport, NetworkError> {
        check_sample(network, 0, input, teacher)?;
        info!(
            regime = "online",
            mode = %self.mode,
            learning_rate = self.prototype.learning_rate(),
            "training started"
        );
        let inputs = [input];
        let teachers = [teacher];
        let loss = self.run_step(network, &inputs, &teachers, &[0], 0, rng)?;
        let report = TrainingReport {
            steps: 1,
            samples_seen: 1,
            losses: vec![loss],
        };
        info!(regime = "online", loss, "training finished");
        Ok(report)
    }

    /// `epochs` updates, each summing gradients over the whole dataset.
    ///
    /// The observer sees the epoch index.
    pub fn train_batch<S, T, R>(
        &mut self,
        network: &mut Network,
        inputs: &[S],
        teachers: &[T],
        epochs: usize,
        rng: &mut R,
    ) -> Result<TrainingReport, NetworkError>
    where
        S: AsRef<[f32]> + Sync,
        T: AsRef<[f32]> + Sync,
        R: Rng + ?Sized,
    {
        check_dataset(network, inputs, teachers)?;
        info!(
            regime = "batch",
            mode = %self.mode,
            learning_rate = self.prototype.learning_rate(),
            samples = inputs.len(),
            epochs,
            "training started"
        );
        let indices: Vec<usize> = (0..inputs.len()).collect();
        let mut report = TrainingReport::default();
        for epoch in 0..epochs {
            let loss = self.run_step(network, inputs, teachers, &indices, epoch, rng)?;
            report.steps += 1;
            report.samples_seen += indices.len();
            report.losses.push(loss);
        }
        info!(
            regime = "batch",
            steps = report.steps,
            loss = ?report.last_loss(),
            "training finished"
        );
        Ok(report)
    }

    /// `(N / batch_size) · epochs` updates, each over `batch_size` samples drawn
    /// without replacement from `rng`.
    ///
    /// The observer sees the step index.
    pub fn train_minibatch<S, T, R>(
        &mut self,
        network: &mut Network,
        inputs: &[S],
        teachers: &[T],
        batch_size: usize,
        epochs: usize,
        rng: &mut R,
    ) -> Result<TrainingReport, NetworkError>
    where
        S: AsRef<[f32]> + Sync,
        T: AsRef<[f32]> + Sync,
        R: Rng + ?Sized,
    {
        check_dataset(network, inputs, teachers)?;
        let samples = inputs.len();
        if batch_size == 0 || batch_size > samples {
            return Err(NetworkError::InvalidBatchSize {
                batch_size,
                samples,
            });
        }
        let steps = (samples / batch_size) * epochs;
        info!(
            regime = "minibatch",
            mode = %self.mode,
            learning_rate = self.prototype.learning_rate(),
            samples,
            batch_size,
            steps,
            "training started"
        );
        let mut report = TrainingReport::default();
        for step in 0..steps {
            let indices = rand::seq::index::sample(rng, samples, batch_size).into_vec();
            let loss = self.run_step(network, inputs, teachers, &indices, step, rng)?;
            report.steps += 1;
            report.samples_seen += batch_size;
            report.losses.push(loss);
        }
        info!(
            regime = "minibatch",
            steps = report.steps,
            loss = ?report.last_loss(),
            "training finished"
        );
        Ok(report)
    }

    /// Accumulate over `indices`, update once, report the mean loss.
    fn run_step<S, T, R>(
        &mut self,
        network: &mut Network,
        inputs: &[S],
        teachers: &[T],
        indices: &[usize],
        step: usize,
        rng: &mut R,
    ) -> Result<f32, NetworkError>
    where
        S: AsRef<[f32]> + Sync,
        T: AsRef<[f32]> + Sync,
        R: Rng + ?Sized,
    {
        let policy = self.mode.policy();
        let gradients = NetworkGradient::for_network(network);
        let mut rngs = derive_rngs(rng, indices.len());
        let optimizers = bank_for(&mut self.optimizers, &self.prototype, network);
        let loss = &self.loss;
        let width_hint = network.depth().max(indices.len());

        let mean = self.scheduler.run(policy, width_hint, || {
            let total = accumulate(
                network, loss, inputs, teachers, indices, &mut rngs, &gradients, policy,
            );
            network.update(optimizers, &gradients, policy);
            total / indices.len() as f32
        })?;

        debug!(step, loss = mean, "step finished");
        if !mean.is_finite() {
            warn!(step, loss = mean, "step loss is not finite");
        }
        if let Some(observer) = self.observer.as_mut() {
            observer(mean, step);
        }
        Ok(mean)
    }
}

/// Sum of sample losses over `indices`, with gradients added into `gradients`.
#[allow(clippy::too_many_arguments)]
fn accumulate<L, S, T>(
    network: &Network,
    loss: &L,
    inputs: &[S],
    teachers: &[T],
    indices: &[usize],
    rngs: &mut [StdRng],
    gradients: &NetworkGradient,
    policy: ExecutionPolicy,
) -> f32
where
    L: Loss,
    S: AsRef<[f32]> + Sync,
    T: AsRef<[f32]> + Sync,
{
    let total = AtomicF32::default();
    let run = |index: usize, rng: &mut StdRng| {
        let sample_loss = network.accumulate_gradient(
            inputs[index].as_ref(),
            teachers[index].as_ref(),
            loss,
            gradients,
            rng,
            policy,
        );
        policy.accumulate(&total, sample_loss);
    };
    match policy.mode() {
        ExecutionMode::Sequential => {
            for (&index, rng) in indices.iter().zip(rngs.iter_mut()) {
                run(index, rng);
            }
        }
        ExecutionMode::Concurrent => {
            indices
                .par_iter()
                .zip(rngs.par_iter_mut())
                .for_each(|(&index, rng)| run(index, rng));
        }
    }
    total.into_inner()
}

/// Reuse the stored bank when it still fits `network`, otherwise rebuild it.
fn bank_for<'b, O: Optimizer>(
    slot: &'b mut Option<NetworkOptimizers<O>>,
    prototype: &O,
    network: &Network,
) -> &'b mut NetworkOptimizers<O> {
    if slot.as_ref().is_some_and(|bank| !bank.matches(network)) {
        warn!("network shape changed, rebuilding optimizer state");
        *slot = None;
    }
    slot.get_or_insert_with(|| NetworkOptimizers::for_network(network, prototype))
}

fn check_sample(
    network: &Network,
    index: usize,
    input: &[f32],
    teacher: &[f32],
) -> Result<(), NetworkError> {
    if input.len() != network.input_size() {
        return Err(NetworkError::SampleShape {
            index,
            expected: network.input_size(),
            found: input.len(),
        });
    }
    if teacher.len() != network.output_size() {
        return Err(NetworkError::SampleShape {
            index,
            expected: network.output_size(),
            found: teacher.len(),
        });
    }
    Ok(())
}

fn check_dataset<S, T>(network: &Network, inputs: &[S], teachers: &[T]) -> Result<(), NetworkError>
where
    S: AsRef<[f32]>,
    T: AsRef<[f32]>,
{
    if inputs.len() != teachers.len() {
        return Err(NetworkError::DatasetMismatch {
            inputs: inputs.len(),
            teachers: teachers.len(),
        });
    }
    if inputs.is_empty() {
        return Err(NetworkError::EmptyDataset);
    }
    inputs
        .iter()
        .zip(teachers)
        .enumerate()
        .try_for_each(|(index, (input, teacher))| {
            check_sample(network, index, input.as_ref(), teacher.as_ref())
        })
}
