//! A single-hidden-layer feed-forward network trained by back-propagation, together with the
//! sample loading and data set partitioning needed to train it on digit images.

#![deny(unsafe_code, rust_2018_idioms, rust_2021_compatibility)]
#![warn(missing_docs)]

pub mod config;
pub mod dataset;
pub mod digit;
pub mod error;
pub mod matrix;
pub mod network;
pub mod partition;
pub mod trainer;

pub use dataset::{Sample, SampleStore};
pub use error::{Error, Result};
pub use network::{Decision, Network};
pub use partition::{DataSet, Partition, Partitioner};
pub use trainer::{Trainer, TrainerState};
