//! A fully connected feed-forward network with a single hidden layer.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use rand::Rng;
use rand_distr::Uniform;

use crate::{
    dataset::Sample,
    error::{Error, Result},
    matrix::Matrix,
};

/// Activations above this value count as a firing output.
pub const ON_THRESHOLD: f64 = 0.9;

/// Activations below this value count as a silent output.
pub const OFF_THRESHOLD: f64 = 0.1;

/// The logistic activation function.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// The thresholded state of a single output neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The activation is below [`OFF_THRESHOLD`].
    Off,
    /// The activation is above [`ON_THRESHOLD`].
    On,
    /// The activation lies between the two thresholds.
    Uncertain,
}

impl Decision {
    /// Threshold an activation or a target value.
    pub fn from_activation(x: f64) -> Self {
        if x > ON_THRESHOLD {
            Self::On
        } else if x < OFF_THRESHOLD {
            Self::Off
        } else {
            Self::Uncertain
        }
    }

    /// Return the numeric form of the decision: `0`, `1`, or `0.5` when uncertain.
    pub fn value(self) -> f64 {
        match self {
            Self::Off => 0.0,
            Self::On => 1.0,
            Self::Uncertain => 0.5,
        }
    }
}

/// A layer of neurons whose activations can be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// The input layer, including the trailing bias neuron.
    Input,
    /// The hidden layer, including the trailing bias neuron.
    Hidden,
    /// The output layer.
    Output,
}

/// A set of weights between two adjacent layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// Weights of shape `(n_input + 1) x n_hidden`.
    InputHidden,
    /// Weights of shape `(n_hidden + 1) x n_output`.
    HiddenOutput,
}

/// Accuracy and mean squared error of the network over a set of samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetStats {
    /// Percentage of samples whose thresholded outputs all match their thresholded targets.
    pub accuracy: f64,
    /// Mean over samples of the mean squared per-output error.
    pub mse: f64,
}

/// A feed-forward network with one hidden layer and sigmoid activations.
///
/// The activation buffers are scratch space overwritten by every call to [`Network::forward`],
/// so a single instance must not be shared between threads without locking. Clone the network to
/// give each thread its own buffers.
#[derive(Debug, Clone)]
pub struct Network {
    n_input: usize,
    n_hidden: usize,
    n_output: usize,
    input: Vec<f64>,
    hidden: Vec<f64>,
    output: Vec<f64>,
    w_input_hidden: Matrix,
    w_hidden_output: Matrix,
}

impl Network {
    /// Create a network with randomly initialised weights.
    pub fn new(n_input: usize, n_hidden: usize, n_output: usize) -> Result<Self> {
        Self::with_rng(n_input, n_hidden, n_output, &mut rand::thread_rng())
    }

    /// Create a network whose weights are drawn from `rng`.
    ///
    /// Each weight is uniform in `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`, where `fan_in` is the
    /// number of non-bias neurons feeding the destination layer.
    pub fn with_rng<R>(n_input: usize, n_hidden: usize, n_output: usize, rng: &mut R) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        if n_input == 0 || n_hidden == 0 || n_output == 0 {
            return Err(Error::InvalidParameter(format!(
                "every layer needs at least one neuron, got {n_input}-{n_hidden}-{n_output}"
            )));
        }
        let range = |fan_in: usize| {
            let r = 1.0 / (fan_in as f64).sqrt();
            Uniform::new_inclusive(-r, r)
        };
        let w_input_hidden = Matrix::rand(n_input + 1, n_hidden, rng, range(n_input));
        let w_hidden_output = Matrix::rand(n_hidden + 1, n_output, rng, range(n_hidden));

        let mut input = vec![0.0; n_input + 1];
        input[n_input] = 1.0;
        let mut hidden = vec![0.0; n_hidden + 1];
        hidden[n_hidden] = 1.0;

        Ok(Self {
            n_input,
            n_hidden,
            n_output,
            input,
            hidden,
            output: vec![0.0; n_output],
            w_input_hidden,
            w_hidden_output,
        })
    }

    /// Create a network and fill it with the weights stored at `path`.
    pub fn from_weights_file(
        path: impl AsRef<Path>,
        n_input: usize,
        n_hidden: usize,
        n_output: usize,
    ) -> Result<Self> {
        let mut network = Self::new(n_input, n_hidden, n_output)?;
        network.load_weights(path)?;
        Ok(network)
    }

    /// Return the number of neurons per layer, excluding bias neurons.
    pub fn topology(&self) -> (usize, usize, usize) {
        (self.n_input, self.n_hidden, self.n_output)
    }

    /// Propagate `input` through the network and return the output activations.
    pub fn forward(&mut self, input: &[f64]) -> Result<&[f64]> {
        if input.len() != self.n_input {
            return Err(Error::DimensionMismatch {
                expected: self.n_input,
                found: input.len(),
            });
        }
        self.input[..self.n_input].copy_from_slice(input);

        let n_hidden = self.n_hidden;
        for (j, h) in self.hidden[..n_hidden].iter_mut().enumerate() {
            *h = sigmoid(weighted_sum(&self.w_input_hidden, j, &self.input));
        }
        for (k, o) in self.output.iter_mut().enumerate() {
            *o = sigmoid(weighted_sum(&self.w_hidden_output, k, &self.hidden));
        }
        Ok(&self.output)
    }

    /// Propagate `input` through the network and threshold every output.
    pub fn classify(&mut self, input: &[f64]) -> Result<Vec<Decision>> {
        let output = self.forward(input)?;
        Ok(output.iter().copied().map(Decision::from_activation).collect())
    }

    /// Compute accuracy and mean squared error over `set`. Both are zero for an empty set.
    pub fn evaluate(&mut self, set: &[&Sample]) -> Result<SetStats> {
        if set.is_empty() {
            return Ok(SetStats::default());
        }
        let mut incorrect = 0usize;
        let mut squared_error = 0.0;
        for sample in set {
            let (correct, error) = self.score(sample)?;
            if !correct {
                incorrect += 1;
            }
            squared_error += error;
        }
        let count = set.len() as f64;
        Ok(SetStats {
            accuracy: 100.0 - incorrect as f64 / count * 100.0,
            mse: squared_error / (self.n_output as f64 * count),
        })
    }

    /// Return the percentage of samples in `set` that are classified correctly.
    pub fn evaluate_accuracy(&mut self, set: &[&Sample]) -> Result<f64> {
        self.evaluate(set).map(|stats| stats.accuracy)
    }

    /// Return the mean squared error of the network over `set`.
    pub fn evaluate_mse(&mut self, set: &[&Sample]) -> Result<f64> {
        self.evaluate(set).map(|stats| stats.mse)
    }

    /// Run one sample forward, returning whether every output matches the target after
    /// thresholding and the summed squared error.
    pub(crate) fn score(&mut self, sample: &Sample) -> Result<(bool, f64)> {
        if sample.target.len() != self.n_output {
            return Err(Error::DimensionMismatch {
                expected: self.n_output,
                found: sample.target.len(),
            });
        }
        let output = self.forward(&sample.input)?;
        let mut correct = true;
        let mut error = 0.0;
        for (o, t) in output.iter().zip(&sample.target) {
            if Decision::from_activation(*o) != Decision::from_activation(*t) {
                correct = false;
            }
            error += (o - t).powi(2);
        }
        Ok((correct, error))
    }

    /// Return the activations computed by the last forward pass.
    pub fn activations(&self, layer: Layer) -> &[f64] {
        match layer {
            Layer::Input => &self.input,
            Layer::Hidden => &self.hidden,
            Layer::Output => &self.output,
        }
    }

    /// Return a weight matrix.
    pub fn weights(&self, connection: Connection) -> &Matrix {
        match connection {
            Connection::InputHidden => &self.w_input_hidden,
            Connection::HiddenOutput => &self.w_hidden_output,
        }
    }

    /// Add `delta` to a weight matrix.
    pub fn apply_weight_delta(&mut self, connection: Connection, delta: &Matrix) -> Result<()> {
        let weights = match connection {
            Connection::InputHidden => &mut self.w_input_hidden,
            Connection::HiddenOutput => &mut self.w_hidden_output,
        };
        if !weights.add_assign(delta) {
            return Err(Error::ShapeMismatch {
                expected: format_shape(weights.shape()),
                found: format_shape(delta.shape()),
            });
        }
        Ok(())
    }

    /// Write the weights to `path`, replacing any existing file.
    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_weights(&mut writer)?;
        writer.flush()?;
        tracing::info!(path = %path.display(), "saved weights");
        Ok(())
    }

    /// Replace the weights with those stored at `path`.
    pub fn load_weights(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        self.read_weights(BufReader::new(file))?;
        tracing::info!(path = %path.display(), "loaded weights");
        Ok(())
    }

    /// Serialise the weights.
    ///
    /// The first line holds the topology as `n_input,n_hidden,n_output`. It is followed by one
    /// line per hidden neuron and then one line per output neuron, each listing the incoming
    /// weights in source order with the bias weight last.
    pub fn write_weights<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{},{},{}", self.n_input, self.n_hidden, self.n_output)?;
        for weights in [&self.w_input_hidden, &self.w_hidden_output] {
            for destination in 0..weights.cols() {
                writeln!(writer, "{}", Row(weights.column(destination)))?;
            }
        }
        Ok(())
    }

    /// Deserialise weights written by [`Network::write_weights`].
    ///
    /// The weights are only replaced once the whole input has been read and checked.
    pub fn read_weights<R: BufRead>(&mut self, reader: R) -> Result<()> {
        let mut lines = reader
            .lines()
            .enumerate()
            .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()));

        let header = match lines.next() {
            Some((_, line)) => line?,
            None => {
                return Err(Error::ShapeMismatch {
                    expected: self.describe(),
                    found: "an empty weight file".to_string(),
                })
            }
        };
        let found = header.trim();
        if found != self.describe() {
            return Err(Error::ShapeMismatch {
                expected: self.describe(),
                found: found.to_string(),
            });
        }

        let mut read_matrix = |sources: usize, destinations: usize| -> Result<Matrix> {
            let mut weights = Matrix::zeros(sources, destinations);
            for destination in 0..destinations {
                let (index, line) = lines.next().ok_or_else(|| Error::ShapeMismatch {
                    expected: format!("{destinations} rows"),
                    found: format!("{destination} rows"),
                })?;
                let row = parse_row(&line?, index + 1)?;
                if row.len() != sources {
                    return Err(Error::ShapeMismatch {
                        expected: format!("{sources} weights on line {}", index + 1),
                        found: format!("{} weights", row.len()),
                    });
                }
                for (source, w) in row.into_iter().enumerate() {
                    weights[(source, destination)] = w;
                }
            }
            Ok(weights)
        };
        let w_input_hidden = read_matrix(self.n_input + 1, self.n_hidden)?;
        let w_hidden_output = read_matrix(self.n_hidden + 1, self.n_output)?;

        if let Some((index, _)) = lines.next() {
            return Err(Error::ShapeMismatch {
                expected: self.describe(),
                found: format!("unexpected weights on line {}", index + 1),
            });
        }

        self.w_input_hidden = w_input_hidden;
        self.w_hidden_output = w_hidden_output;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{},{},{}", self.n_input, self.n_hidden, self.n_output)
    }
}

/// Sum of `activations[i] * weights[(i, destination)]` over all source neurons.
fn weighted_sum(weights: &Matrix, destination: usize, activations: &[f64]) -> f64 {
    weights
        .column(destination)
        .zip(activations)
        .map(|(w, x)| w * x)
        .sum()
}

fn format_shape((rows, cols): (usize, usize)) -> String {
    format!("{rows}x{cols}")
}

fn parse_row(line: &str, number: usize) -> Result<Vec<f64>> {
    line.split(',')
        .map(|field| {
            field.trim().parse::<f64>().map_err(|_| Error::DataFormat {
                line: number,
                message: format!("`{}` is not a weight", field.trim()),
            })
        })
        .collect()
}

/// Comma-separated display of a sequence of weights.
struct Row<I>(I);

impl<I> fmt::Display for Row<I>
where
    I: Iterator<Item = f64> + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, w) in self.0.clone().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{w}")?;
        }
        Ok(())
    }
}
