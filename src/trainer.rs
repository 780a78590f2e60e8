//! Gradient descent with momentum for [`Network`].

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time,
};

use crate::{
    dataset::Sample,
    error::{Error, Result},
    matrix::Matrix,
    network::{Connection, Layer, Network, SetStats},
    partition::DataSet,
};

/// Default step size of the weight update.
pub const LEARNING_RATE: f64 = 0.001;
/// Default fraction of the previous update carried into the next one.
pub const MOMENTUM: f64 = 0.9;
/// Default number of epochs after which training gives up.
pub const MAX_EPOCHS: u64 = 1500;
/// Default validation accuracy, in percent, at which training stops.
pub const DESIRED_ACCURACY: f64 = 90.0;

/// A flag that asks a running [`Trainer`] to stop after the current epoch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone of the token observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a trainer is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    /// No training has happened since creation or the last reset.
    Idle,
    /// Epochs are being run.
    Running,
    /// The validation accuracy reached the desired accuracy.
    Converged,
    /// The maximum number of epochs was reached first.
    Stopped,
    /// A [`CancellationToken`] ended training between two epochs.
    Cancelled,
}

/// Accuracy and error of the network over each subset after an epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochStats {
    /// The epoch these figures were measured after.
    pub epoch: u64,
    /// Figures over the training subset.
    pub training: SetStats,
    /// Figures over the generalization subset.
    pub generalization: SetStats,
    /// Figures over the validation subset.
    pub validation: SetStats,
}

/// The result of a call to [`Trainer::train`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingOutcome {
    /// The terminal state reached.
    pub state: TrainerState,
    /// Number of epochs run by this call.
    pub epochs: u64,
    /// Figures measured after the last epoch.
    pub stats: EpochStats,
}

struct TrainingLog {
    writer: Box<dyn Write + Send>,
    resolution: u64,
    last_logged: Option<u64>,
}

impl TrainingLog {
    const HEADER: &'static str = "epoch,training_accuracy,training_mse,generalization_accuracy,\
                                  generalization_mse,validation_accuracy,validation_mse";

    fn is_due(&self, epoch: u64) -> bool {
        self.last_logged
            .map_or(true, |last| epoch.saturating_sub(last) >= self.resolution)
    }

    fn write(&mut self, stats: &EpochStats) -> Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{}",
            stats.epoch,
            stats.training.accuracy,
            stats.training.mse,
            stats.generalization.accuracy,
            stats.generalization.mse,
            stats.validation.accuracy,
            stats.validation.mse,
        )?;
        self.last_logged = Some(stats.epoch);
        Ok(())
    }
}

/// Trains a network by back-propagation, one epoch at a time.
///
/// The epoch counter accumulates over successive calls to [`Trainer::train`] until
/// [`Trainer::reset`] is called, so data sets produced one after another by a
/// [`Partitioner`](crate::partition::Partitioner) share one run.
pub struct Trainer<'n> {
    network: &'n mut Network,
    learning_rate: f64,
    momentum: f64,
    use_batch: bool,
    max_epochs: u64,
    desired_accuracy: f64,
    epoch: u64,
    state: TrainerState,
    stats: EpochStats,
    delta_input_hidden: Matrix,
    delta_hidden_output: Matrix,
    hidden_gradients: Vec<f64>,
    output_gradients: Vec<f64>,
    log: Option<TrainingLog>,
    cancellation: Option<CancellationToken>,
}

impl<'n> Trainer<'n> {
    /// Create a trainer for `network` using the default hyperparameters.
    pub fn new(network: &'n mut Network) -> Self {
        let (n_input, n_hidden, n_output) = network.topology();
        Self {
            network,
            learning_rate: LEARNING_RATE,
            momentum: MOMENTUM,
            use_batch: false,
            max_epochs: MAX_EPOCHS,
            desired_accuracy: DESIRED_ACCURACY,
            epoch: 0,
            state: TrainerState::Idle,
            stats: EpochStats::default(),
            delta_input_hidden: Matrix::zeros(n_input + 1, n_hidden),
            delta_hidden_output: Matrix::zeros(n_hidden + 1, n_output),
            hidden_gradients: vec![0.0; n_hidden],
            output_gradients: vec![0.0; n_output],
            log: None,
            cancellation: None,
        }
    }

    /// Set the learning rate, the momentum and whether weights are updated once per epoch.
    ///
    /// Momentum only applies to online updates; batch updates apply the plain accumulated
    /// deltas.
    pub fn configure(&mut self, learning_rate: f64, momentum: f64, use_batch: bool) -> Result<()> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "learning rate must be positive, got {learning_rate}"
            )));
        }
        if !(0.0..1.0).contains(&momentum) {
            return Err(Error::InvalidParameter(format!(
                "momentum must lie in [0, 1), got {momentum}"
            )));
        }
        self.learning_rate = learning_rate;
        self.momentum = momentum;
        self.use_batch = use_batch;
        Ok(())
    }

    /// Set the epoch limit per call to [`Trainer::train`] and the validation accuracy, in
    /// percent, at which training stops.
    pub fn set_stopping_conditions(&mut self, max_epochs: u64, desired_accuracy: f64) -> Result<()> {
        if max_epochs == 0 {
            return Err(Error::InvalidParameter(
                "at least one epoch is required".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&desired_accuracy) {
            return Err(Error::InvalidParameter(format!(
                "desired accuracy must lie in [0, 100], got {desired_accuracy}"
            )));
        }
        self.max_epochs = max_epochs;
        self.desired_accuracy = desired_accuracy;
        Ok(())
    }

    /// Write per-epoch statistics to a new file at `path` every `resolution` epochs.
    pub fn enable_logging(&mut self, path: impl AsRef<Path>, resolution: u64) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.enable_logging_to(BufWriter::new(file), resolution)
    }

    /// Write per-epoch statistics to `writer` every `resolution` epochs.
    pub fn enable_logging_to<W>(&mut self, writer: W, resolution: u64) -> Result<()>
    where
        W: Write + Send + 'static,
    {
        if resolution == 0 {
            return Err(Error::InvalidParameter(
                "log resolution must be positive".to_string(),
            ));
        }
        let mut writer: Box<dyn Write + Send> = Box::new(writer);
        writeln!(writer, "{}", TrainingLog::HEADER)?;
        self.log = Some(TrainingLog {
            writer,
            resolution,
            last_logged: None,
        });
        Ok(())
    }

    /// Stop training between epochs once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Return the number of epochs run since creation or the last reset.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Return the current state.
    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Return the figures measured after the latest epoch.
    pub fn stats(&self) -> &EpochStats {
        &self.stats
    }

    /// Return the network being trained.
    pub fn network(&self) -> &Network {
        &*self.network
    }

    /// Start a new run: the epoch counter and statistics go back to zero.
    pub fn reset(&mut self) {
        self.epoch = 0;
        self.state = TrainerState::Idle;
        self.stats = EpochStats::default();
        if let Some(log) = &mut self.log {
            log.last_logged = None;
        }
    }

    /// Train on `data` until the validation accuracy reaches the desired accuracy, the epoch
    /// limit is hit, or the cancellation token fires.
    pub fn train(&mut self, data: &DataSet<'_>) -> Result<TrainingOutcome> {
        if data.training.is_empty() {
            return Err(Error::InsufficientData {
                samples: data.len(),
                reason: "the training subset is empty".to_string(),
            });
        }
        self.check_dimensions(data)?;
        self.delta_input_hidden.fill(0.0);
        self.delta_hidden_output.fill(0.0);
        self.hidden_gradients.fill(0.0);
        self.output_gradients.fill(0.0);

        self.state = TrainerState::Running;
        let result = self.run(data);
        if result.is_err() {
            self.state = TrainerState::Idle;
        }
        result
    }

    /// Reject samples that do not fit the network before any weight is touched.
    fn check_dimensions(&self, data: &DataSet<'_>) -> Result<()> {
        let (n_input, _, n_output) = self.network.topology();
        let samples = data
            .training
            .iter()
            .chain(&data.generalization)
            .chain(&data.validation);
        for sample in samples {
            if sample.input.len() != n_input {
                return Err(Error::DimensionMismatch {
                    expected: n_input,
                    found: sample.input.len(),
                });
            }
            if sample.target.len() != n_output {
                return Err(Error::DimensionMismatch {
                    expected: n_output,
                    found: sample.target.len(),
                });
            }
        }
        Ok(())
    }

    fn run(&mut self, data: &DataSet<'_>) -> Result<TrainingOutcome> {
        tracing::info!(
            training = data.training.len(),
            generalization = data.generalization.len(),
            validation = data.validation.len(),
            learning_rate = self.learning_rate,
            momentum = self.momentum,
            batch = self.use_batch,
            "training started"
        );
        let start = time::Instant::now();
        let mut epochs = 0;
        loop {
            if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
                tracing::warn!(epoch = self.epoch, "training cancelled");
                self.state = TrainerState::Cancelled;
                break;
            }

            self.run_epoch(&data.training)?;
            self.epoch += 1;
            epochs += 1;
            self.stats = EpochStats {
                epoch: self.epoch,
                training: self.network.evaluate(&data.training)?,
                generalization: self.network.evaluate(&data.generalization)?,
                validation: self.network.evaluate(&data.validation)?,
            };
            tracing::debug!(
                epoch = self.epoch,
                training_accuracy = self.stats.training.accuracy,
                training_mse = self.stats.training.mse,
                generalization_accuracy = self.stats.generalization.accuracy,
                generalization_mse = self.stats.generalization.mse,
                validation_accuracy = self.stats.validation.accuracy,
                validation_mse = self.stats.validation.mse,
                "epoch finished"
            );
            if let Some(log) = &mut self.log {
                if log.is_due(self.epoch) {
                    log.write(&self.stats)?;
                }
            }

            if self.stats.validation.accuracy >= self.desired_accuracy {
                self.state = TrainerState::Converged;
                break;
            }
            if epochs >= self.max_epochs {
                tracing::warn!(
                    epoch = self.epoch,
                    validation_accuracy = self.stats.validation.accuracy,
                    "maximum number of epochs reached"
                );
                self.state = TrainerState::Stopped;
                break;
            }
        }

        if let Some(log) = &mut self.log {
            if epochs > 0 && log.last_logged != Some(self.epoch) {
                log.write(&self.stats)?;
            }
            log.writer.flush()?;
        }
        tracing::info!(
            state = ?self.state,
            epochs,
            validation_accuracy = self.stats.validation.accuracy,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "training finished"
        );
        Ok(TrainingOutcome {
            state: self.state,
            epochs,
            stats: self.stats,
        })
    }

    fn run_epoch(&mut self, training: &[&Sample]) -> Result<()> {
        for sample in training {
            self.network.forward(&sample.input)?;
            self.backpropagate(&sample.target)?;
            if !self.use_batch {
                self.update_weights()?;
            }
        }
        if self.use_batch {
            self.update_weights()?;
        }
        Ok(())
    }

    /// Compute the error gradients for the last forward pass and fold them into the deltas.
    fn backpropagate(&mut self, target: &[f64]) -> Result<()> {
        let network = &*self.network;
        let (n_input, n_hidden, n_output) = network.topology();
        if target.len() != n_output {
            return Err(Error::DimensionMismatch {
                expected: n_output,
                found: target.len(),
            });
        }
        let input = network.activations(Layer::Input);
        let hidden = network.activations(Layer::Hidden);
        let output = network.activations(Layer::Output);

        for (k, gradient) in self.output_gradients.iter_mut().enumerate() {
            *gradient = output[k] * (1.0 - output[k]) * (target[k] - output[k]);
        }
        for j in 0..=n_hidden {
            for k in 0..n_output {
                let step = self.learning_rate * hidden[j] * self.output_gradients[k];
                let delta = &mut self.delta_hidden_output[(j, k)];
                *delta = if self.use_batch {
                    *delta + step
                } else {
                    step + self.momentum * *delta
                };
            }
        }

        let w_hidden_output = network.weights(Connection::HiddenOutput);
        for j in 0..n_hidden {
            let propagated: f64 = w_hidden_output
                .row(j)
                .iter()
                .zip(&self.output_gradients)
                .map(|(w, g)| w * g)
                .sum();
            self.hidden_gradients[j] = hidden[j] * (1.0 - hidden[j]) * propagated;
            for i in 0..=n_input {
                let step = self.learning_rate * input[i] * self.hidden_gradients[j];
                let delta = &mut self.delta_input_hidden[(i, j)];
                *delta = if self.use_batch {
                    *delta + step
                } else {
                    step + self.momentum * *delta
                };
            }
        }
        Ok(())
    }

    fn update_weights(&mut self) -> Result<()> {
        self.network
            .apply_weight_delta(Connection::InputHidden, &self.delta_input_hidden)?;
        self.network
            .apply_weight_delta(Connection::HiddenOutput, &self.delta_hidden_output)?;
        if self.use_batch {
            self.delta_input_hidden.fill(0.0);
            self.delta_hidden_output.fill(0.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn and_gate() -> Vec<Sample> {
        [(0.0, 0.0, 0.0), (0.0, 1.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 1.0)]
            .into_iter()
            .map(|(x, y, z)| Sample::new(vec![x, y], vec![z]))
            .collect()
    }

    #[test]
    fn online_update_moves_output_towards_target() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut network = Network::with_rng(2, 3, 1, &mut rng).unwrap();
        let sample = Sample::new(vec![1.0, 0.0], vec![1.0]);
        let before = network.forward(&sample.input).unwrap()[0];

        let mut trainer = Trainer::new(&mut network);
        trainer.configure(0.5, 0.0, false).unwrap();
        trainer.network.forward(&sample.input).unwrap();
        trainer.backpropagate(&sample.target).unwrap();
        trainer.update_weights().unwrap();
        drop(trainer);

        let after = network.forward(&sample.input).unwrap()[0];
        assert!(after > before, "{after} <= {before}");
    }

    #[test]
    fn batch_deltas_are_cleared_after_update() {
        let samples = and_gate();
        let refs: Vec<_> = samples.iter().collect();
        let mut network = Network::with_rng(2, 2, 1, &mut StdRng::seed_from_u64(5)).unwrap();
        let mut trainer = Trainer::new(&mut network);
        trainer.configure(0.1, 0.9, true).unwrap();
        trainer.run_epoch(&refs).unwrap();
        assert!(trainer.delta_input_hidden.as_slice().iter().all(|d| *d == 0.0));
        assert!(trainer
            .delta_hidden_output
            .as_slice()
            .iter()
            .all(|d| *d == 0.0));
    }

    #[test]
    fn log_resolution() {
        let log = TrainingLog {
            writer: Box::new(Vec::new()),
            resolution: 5,
            last_logged: Some(1),
        };
        assert!(!log.is_due(5));
        assert!(log.is_due(6));
    }

    #[test]
    fn rejects_invalid_hyperparameters() {
        let mut network = Network::new(2, 2, 1).unwrap();
        let mut trainer = Trainer::new(&mut network);
        assert!(trainer.configure(0.0, 0.5, false).is_err());
        assert!(trainer.configure(0.1, 1.0, false).is_err());
        assert!(trainer.set_stopping_conditions(0, 90.0).is_err());
        assert!(trainer.set_stopping_conditions(10, 101.0).is_err());
        assert!(trainer.enable_logging_to(Vec::new(), 0).is_err());
    }

    #[test]
    fn empty_training_subset() {
        let mut network = Network::new(2, 2, 1).unwrap();
        let mut trainer = Trainer::new(&mut network);
        let err = trainer.train(&DataSet::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
        assert_eq!(trainer.state(), TrainerState::Idle);
    }
}
