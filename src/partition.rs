//! Splitting a sample store into training, generalization and validation subsets.

use serde::{Deserialize, Serialize};

use crate::{
    dataset::{Sample, SampleStore},
    error::{Error, Result},
};

/// Share of a split that goes to the training subset when a policy does not choose one itself.
pub const DEFAULT_TRAINING_RATIO: f64 = 0.6;

/// The policy used to carve data sets out of a sample store.
///
/// File order is always respected; nothing is shuffled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Partition {
    /// A single split: the first `training_ratio` of the store trains, the remainder is divided
    /// evenly between generalization and validation.
    Static {
        /// Fraction of the store used for training, in `(0, 1)`.
        training_ratio: f64,
    },
    /// A fixed hold-out at the tail of the store and a training window at the head that grows by
    /// `step_percent` percent of the store on every request.
    Growing {
        /// Growth per data set as a percentage of the store, in `(0, 100]`.
        step_percent: f64,
    },
    /// The same tail hold-out as [`Partition::Growing`], and a training window of exactly
    /// `window_size` samples that slides forward through the remaining head of the store by
    /// `step_size` samples on every request.
    Windowing {
        /// Number of training samples in each data set.
        window_size: usize,
        /// Number of samples the window moves by.
        step_size: usize,
        /// Whether the window wraps around to the start of the training pool instead of stopping
        /// at its end.
        #[serde(default)]
        wrap: bool,
    },
}

impl Default for Partition {
    fn default() -> Self {
        Self::Static {
            training_ratio: DEFAULT_TRAINING_RATIO,
        }
    }
}

impl Partition {
    /// Return how many data sets this policy can create from `samples` samples.
    ///
    /// Fails if a parameter is out of range or if any subset would be empty.
    pub fn num_training_sets(&self, samples: usize) -> Result<usize> {
        match *self {
            Self::Static { training_ratio } => {
                if !(training_ratio > 0.0 && training_ratio < 1.0) {
                    return Err(Error::InvalidParameter(format!(
                        "training ratio must lie in (0, 1), got {training_ratio}"
                    )));
                }
                Split::new(samples, training_ratio).check(samples)?;
                Ok(1)
            }
            Self::Growing { step_percent } => {
                if !(step_percent > 0.0 && step_percent <= 100.0) {
                    return Err(Error::InvalidParameter(format!(
                        "growing step must lie in (0, 100], got {step_percent}"
                    )));
                }
                let split = Split::new(samples, DEFAULT_TRAINING_RATIO);
                split.check(samples)?;
                Ok(split.training.div_ceil(growing_step(samples, step_percent)))
            }
            Self::Windowing {
                window_size,
                step_size,
                wrap,
            } => {
                if window_size == 0 || step_size == 0 {
                    return Err(Error::InvalidParameter(format!(
                        "window size and step must be positive, got {window_size} and {step_size}"
                    )));
                }
                let split = Split::new(samples, DEFAULT_TRAINING_RATIO);
                split.check(samples)?;
                let pool = split.training;
                if window_size > pool {
                    return Err(Error::InsufficientData {
                        samples,
                        reason: format!(
                            "window of {window_size} does not fit in a training pool of {pool}"
                        ),
                    });
                }
                if wrap {
                    Ok(pool.div_ceil(step_size))
                } else {
                    Ok((pool - window_size) / step_size + 1)
                }
            }
        }
    }
}

/// Number of samples added to a growing training window per data set.
fn growing_step(samples: usize, step_percent: f64) -> usize {
    ((step_percent / 100.0) * samples as f64).ceil().max(1.0) as usize
}

/// Sizes of the three subsets of a contiguous run of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Split {
    training: usize,
    generalization: usize,
    validation: usize,
}

impl Split {
    fn new(len: usize, training_ratio: f64) -> Self {
        let training = ((len as f64 * training_ratio).floor() as usize).min(len);
        let rest = len - training;
        let generalization = rest.div_ceil(2);
        Self {
            training,
            generalization,
            validation: rest - generalization,
        }
    }

    fn check(&self, samples: usize) -> Result<()> {
        let empty = [
            ("training", self.training),
            ("generalization", self.generalization),
            ("validation", self.validation),
        ]
        .into_iter()
        .find(|(_, size)| *size == 0);
        match empty {
            Some((name, _)) => Err(Error::InsufficientData {
                samples,
                reason: format!("the {name} subset would be empty"),
            }),
            None => Ok(()),
        }
    }
}

/// Three disjoint subsets of a sample store.
#[derive(Debug, Clone, Default)]
pub struct DataSet<'a> {
    /// Samples used to update the weights.
    pub training: Vec<&'a Sample>,
    /// Held-out samples used to monitor overfitting.
    pub generalization: Vec<&'a Sample>,
    /// Held-out samples whose accuracy decides when training stops.
    pub validation: Vec<&'a Sample>,
}

impl<'a> DataSet<'a> {
    /// Create a data set from explicit subsets.
    ///
    /// The caller is responsible for keeping the subsets disjoint.
    pub fn new(
        training: Vec<&'a Sample>,
        generalization: Vec<&'a Sample>,
        validation: Vec<&'a Sample>,
    ) -> Self {
        Self {
            training,
            generalization,
            validation,
        }
    }

    /// Return the total number of samples over all three subsets.
    pub fn len(&self) -> usize {
        self.training.len() + self.generalization.len() + self.validation.len()
    }

    /// Check if all three subsets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Produces successive data sets from a sample store under a [`Partition`] policy.
#[derive(Debug, Clone)]
pub struct Partitioner<'a> {
    store: &'a SampleStore,
    policy: Partition,
    available: usize,
    created: usize,
}

impl<'a> Partitioner<'a> {
    /// Create a partitioner, validating the policy against the size of the store.
    pub fn new(store: &'a SampleStore, policy: Partition) -> Result<Self> {
        let available = policy.num_training_sets(store.len())?;
        tracing::debug!(?policy, samples = store.len(), available, "created partitioner");
        Ok(Self {
            store,
            policy,
            available,
            created: 0,
        })
    }

    /// Return the policy in use.
    pub fn policy(&self) -> Partition {
        self.policy
    }

    /// Return how many data sets the policy can produce in total.
    pub fn num_training_sets(&self) -> usize {
        self.available
    }

    /// Return how many data sets can still be created.
    pub fn remaining(&self) -> usize {
        self.available - self.created
    }

    /// Start over from the first data set.
    pub fn reset(&mut self) {
        self.created = 0;
    }

    /// Create the next data set.
    pub fn create_data_set(&mut self) -> Result<DataSet<'a>> {
        if self.created >= self.available {
            return Err(Error::ExhaustedPartitions {
                requested: self.created + 1,
                available: self.available,
            });
        }
        let index = self.created;
        let n = self.store.len();
        let data_set = match self.policy {
            Partition::Static { training_ratio } => {
                let split = Split::new(n, training_ratio);
                self.held_out(split, 0..split.training)
            }
            Partition::Growing { step_percent } => {
                let split = Split::new(n, DEFAULT_TRAINING_RATIO);
                let end = ((index + 1) * growing_step(n, step_percent)).min(split.training);
                self.held_out(split, 0..end)
            }
            Partition::Windowing {
                window_size,
                step_size,
                ..
            } => {
                let split = Split::new(n, DEFAULT_TRAINING_RATIO);
                let pool = split.training;
                let start = index * step_size % pool;
                self.held_out(split, (start..start + window_size).map(|i| i % pool))
            }
        };
        self.created += 1;
        tracing::debug!(
            index,
            training = data_set.training.len(),
            generalization = data_set.generalization.len(),
            validation = data_set.validation.len(),
            "created data set"
        );
        Ok(data_set)
    }

    /// Pair `training` indices with the hold-out that follows the first `split.training` samples.
    fn held_out(&self, split: Split, training: impl Iterator<Item = usize>) -> DataSet<'a> {
        let generalization = split.training + split.generalization;
        let validation = generalization + split.validation;
        DataSet::new(
            self.pick(training),
            self.pick(split.training..generalization),
            self.pick(generalization..validation),
        )
    }

    fn pick(&self, indices: impl Iterator<Item = usize>) -> Vec<&'a Sample> {
        let samples = self.store.samples();
        indices.map(|i| &samples[i]).collect()
    }
}
