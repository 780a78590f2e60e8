//! Data structures and methods for dealing with labelled samples.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::error::{Error, Result};

/// A single sample within a dataset of mappings from input vectors to target vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The input data, typically normalised pixel intensities.
    pub input: Vec<f64>,
    /// The desired output, one value per class.
    pub target: Vec<f64>,
}

impl Sample {
    /// Create a sample from its input and target vectors.
    pub fn new(input: Vec<f64>, target: Vec<f64>) -> Self {
        Self { input, target }
    }
}

/// An ordered collection of samples sharing the same input and target lengths.
#[derive(Debug, Clone)]
pub struct SampleStore {
    samples: Vec<Sample>,
    n_inputs: usize,
    n_outputs: usize,
}

impl SampleStore {
    /// Create an empty store for samples with the given dimensions.
    pub fn new(n_inputs: usize, n_outputs: usize) -> Self {
        Self {
            samples: Vec::new(),
            n_inputs,
            n_outputs,
        }
    }

    /// Read a store from a delimited text file.
    pub fn load(path: impl AsRef<Path>, n_inputs: usize, n_outputs: usize) -> Result<Self> {
        let mut store = Self::new(n_inputs, n_outputs);
        store.load_data_file(path)?;
        Ok(store)
    }

    /// Build a store from samples that were constructed in memory.
    pub fn from_samples(samples: Vec<Sample>, n_inputs: usize, n_outputs: usize) -> Result<Self> {
        for sample in &samples {
            if sample.input.len() != n_inputs {
                return Err(Error::DimensionMismatch {
                    expected: n_inputs,
                    found: sample.input.len(),
                });
            }
            if sample.target.len() != n_outputs {
                return Err(Error::DimensionMismatch {
                    expected: n_outputs,
                    found: sample.target.len(),
                });
            }
        }
        Ok(Self {
            samples,
            n_inputs,
            n_outputs,
        })
    }

    /// Replace the contents of the store with the samples in `path`.
    ///
    /// Each line holds `n_inputs` input fields followed by `n_outputs` target fields, separated by
    /// commas and/or whitespace. Blank lines are skipped. On failure the store is left empty.
    pub fn load_data_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.samples.clear();
        let file = File::open(path).map_err(|source| Error::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        self.samples = self.parse(BufReader::new(file))?;
        tracing::debug!(
            path = %path.display(),
            samples = self.samples.len(),
            "loaded sample file"
        );
        Ok(())
    }

    /// Parse samples from a reader using the store's dimensions.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Sample>> {
        let width = self.n_inputs + self.n_outputs;
        let mut samples = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let fields = match parse_line(&line, index + 1)? {
                Some(fields) => fields,
                None => continue,
            };
            if fields.len() != width {
                return Err(Error::DataFormat {
                    line: index + 1,
                    message: format!("expected {width} fields, found {}", fields.len()),
                });
            }
            let mut input = fields;
            let target = input.split_off(self.n_inputs);
            samples.push(Sample::new(input, target));
        }
        tracing::trace!(samples = samples.len(), "parsed samples");
        Ok(samples)
    }

    /// Return the number of loaded samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the store holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Return the length of every input vector.
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    /// Return the length of every target vector.
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Return all samples in file order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

/// Split a line into numbers. Returns `None` for blank lines.
fn parse_line(line: &str, number: usize) -> Result<Option<Vec<f64>>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .map(|field| {
            field.parse::<f64>().map_err(|_| Error::DataFormat {
                line: number,
                message: format!("`{field}` is not a number"),
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mixed_delimiters() {
        let store = SampleStore::new(2, 1);
        let samples = store.parse("0.5, 1\t0\n\n1 1 ,1\n".as_bytes()).unwrap();
        assert_eq!(
            samples,
            vec![
                Sample::new(vec![0.5, 1.0], vec![0.0]),
                Sample::new(vec![1.0, 1.0], vec![1.0]),
            ]
        );
    }

    #[test]
    fn parse_reports_line_of_bad_field() {
        let store = SampleStore::new(1, 1);
        let err = store.parse("1,0\n1,x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::DataFormat { line: 2, .. }), "{err}");
    }

    #[test]
    fn from_samples_validates_dimensions() {
        let samples = vec![Sample::new(vec![0.0, 1.0], vec![1.0, 0.0])];
        assert!(SampleStore::from_samples(samples.clone(), 2, 2).is_ok());
        assert!(matches!(
            SampleStore::from_samples(samples, 2, 1),
            Err(Error::DimensionMismatch {
                expected: 1,
                found: 2
            })
        ));
    }
}
