//! Defines the errors raised while loading data, building networks and training.

use std::{io, path::PathBuf};

/// An error type for all fallible operations in the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A data or weight file could not be opened.
    #[error("cannot read {}: {source}", .path.display())]
    FileNotFound {
        /// The path that was requested.
        path: PathBuf,
        /// The underlying I/O failure.
        source: io::Error,
    },
    /// A line in a sample file could not be parsed.
    #[error("line {line}: {message}")]
    DataFormat {
        /// 1-based line number.
        line: usize,
        /// What went wrong on that line.
        message: String,
    },
    /// A vector had a different length than the layer it is fed to.
    #[error("expected a vector of length {expected}, but got {found}")]
    DimensionMismatch {
        /// Required length.
        expected: usize,
        /// Length actually given.
        found: usize,
    },
    /// Persisted weights do not fit the constructed topology.
    #[error("weight shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Shape of the constructed network.
        expected: String,
        /// Shape found in the weight source.
        found: String,
    },
    /// More data sets were requested than the partition policy can produce.
    #[error("requested data set {requested}, but only {available} are available")]
    ExhaustedPartitions {
        /// 1-based index of the requested data set.
        requested: usize,
        /// Number of data sets the policy can produce.
        available: usize,
    },
    /// The sample store is too small for the requested partitioning.
    #[error("insufficient data ({samples} samples): {reason}")]
    InsufficientData {
        /// Number of samples in the store.
        samples: usize,
        /// Which subset could not be formed.
        reason: String,
    },
    /// A hyperparameter or policy parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The training configuration could not be read.
    #[error("configuration error: {0}")]
    Config(String),
    /// Writing weights or logs failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A specialised result type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
