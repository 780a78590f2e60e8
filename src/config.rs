//! Training configuration via TOML files.
//!
//! Every section and field is optional and falls back to the defaults of the digit recogniser:
//!
//! ```toml
//! [network]
//! inputs = 784
//! hidden = 20
//! outputs = 10
//!
//! [training]
//! learning_rate = 0.001
//! momentum = 0.9
//! batch = false
//! max_epochs = 1500
//! desired_accuracy = 90.0
//! seed = 42
//!
//! [data]
//! path = "ledgerdigits.csv"
//! partition = { policy = "static", training_ratio = 0.6 }
//!
//! [output]
//! weights = "weights.csv"
//! log = "log.csv"
//! log_resolution = 5
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    digit::DIGITS,
    error::{Error, Result},
    partition::Partition,
    trainer::{DESIRED_ACCURACY, LEARNING_RATE, MAX_EPOCHS, MOMENTUM},
};

/// Everything needed to run a training session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Network topology.
    pub network: NetworkConfig,
    /// Hyperparameters and stopping conditions.
    pub training: TrainerConfig,
    /// Sample file and partitioning.
    pub data: DataConfig,
    /// Where results are written.
    pub output: OutputConfig,
}

/// Number of neurons per layer, excluding bias neurons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Length of the input vector, one per pixel of a normalised digit image.
    pub inputs: usize,
    /// Hidden neurons.
    pub hidden: usize,
    /// Output neurons, one per class.
    pub outputs: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            inputs: 784,
            hidden: 20,
            outputs: DIGITS,
        }
    }
}

/// Hyperparameters of the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainerConfig {
    /// Step size of the weight update.
    pub learning_rate: f64,
    /// Fraction of the previous update carried into the next one.
    pub momentum: f64,
    /// Update the weights once per epoch instead of after every sample.
    pub batch: bool,
    /// Epoch limit per data set.
    pub max_epochs: u64,
    /// Validation accuracy, in percent, at which training stops.
    pub desired_accuracy: f64,
    /// Seed for the initial weights; random when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: LEARNING_RATE,
            momentum: MOMENTUM,
            batch: false,
            max_epochs: MAX_EPOCHS,
            desired_accuracy: DESIRED_ACCURACY,
            seed: None,
        }
    }
}

/// Input data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Sample file; must be given here or on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// How data sets are carved out of the samples.
    pub partition: Partition,
}

/// Output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Where the trained weights are saved.
    pub weights: PathBuf,
    /// Where per-epoch statistics are written, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,
    /// Write statistics every this many epochs.
    pub log_resolution: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            weights: PathBuf::from("weights.csv"),
            log: None,
            log_resolution: 5,
        }
    }
}

impl TrainingConfig {
    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| Error::Config(err.to_string()))
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| Error::Config(err.to_string()))
    }
}
