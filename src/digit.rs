//! Digit labels and shared digit recognition.
//!
//! Output neuron `i` stands for digit `(i + 1) % 10`: training patterns are arranged
//! `1, 2, ..., 9, 0`, so the last neuron recognises zero.

use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    error::{Error, Result},
    network::{Decision, Layer, Network},
};

/// Number of output neurons of a digit classifier.
pub const DIGITS: usize = 10;

/// Return the digit recognised by output neuron `index`.
pub fn label(index: usize) -> u8 {
    ((index + 1) % DIGITS) as u8
}

/// Return the output neuron that recognises `digit`.
pub fn neuron(digit: u8) -> usize {
    (usize::from(digit) + DIGITS - 1) % DIGITS
}

/// Build the target vector for `digit`.
pub fn encode(digit: u8) -> Result<Vec<f64>> {
    if usize::from(digit) >= DIGITS {
        return Err(Error::InvalidParameter(format!("{digit} is not a digit")));
    }
    let mut target = vec![0.0; DIGITS];
    target[neuron(digit)] = 1.0;
    Ok(target)
}

/// Resolve thresholded outputs into a digit.
///
/// The last neuron that fired cleanly wins and is mapped through [`label`]. If none did, the
/// index of the highest activation is returned as is, without the label mapping. Returns `None`
/// when there is no usable activation.
pub fn decode(decisions: &[Decision], activations: &[f64]) -> Option<u8> {
    if let Some(index) = decisions.iter().rposition(|d| *d == Decision::On) {
        return Some(label(index));
    }
    activations
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &a)| match best {
            Some((_, max)) if max >= a => best,
            _ => Some((i, a)),
        })
        .and_then(|(index, _)| u8::try_from(index).ok())
}

/// A digit recogniser sharing one trained network between callers.
///
/// Clones refer to the same network; calls are serialised because each forward pass overwrites
/// the network's activation buffers.
#[derive(Debug, Clone)]
pub struct DigitClassifier {
    network: Arc<Mutex<Network>>,
}

impl DigitClassifier {
    /// Wrap a network with ten output neurons.
    pub fn new(network: Network) -> Result<Self> {
        let (_, _, n_output) = network.topology();
        if n_output != DIGITS {
            return Err(Error::ShapeMismatch {
                expected: format!("{DIGITS} outputs"),
                found: format!("{n_output} outputs"),
            });
        }
        Ok(Self {
            network: Arc::new(Mutex::new(network)),
        })
    }

    /// Load a network with ten output neurons from a weight file.
    pub fn from_weights_file(path: impl AsRef<Path>, n_input: usize, n_hidden: usize) -> Result<Self> {
        Self::new(Network::from_weights_file(path, n_input, n_hidden, DIGITS)?)
    }

    /// Recognise the digit in a flattened, normalised image.
    pub fn recognise(&self, input: &[f64]) -> Result<Option<u8>> {
        let mut network = self.network.lock().unwrap_or_else(PoisonError::into_inner);
        let decisions = network.classify(input)?;
        Ok(decode(&decisions, network.activations(Layer::Output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_the_last_neuron() {
        assert_eq!(label(0), 1);
        assert_eq!(label(9), 0);
        assert_eq!(neuron(0), 9);
        assert!((0..10).all(|d| label(neuron(d)) == d));
    }

    #[test]
    fn encode_digit() {
        let target = encode(3).unwrap();
        assert_eq!(target.len(), DIGITS);
        assert_eq!(target[2], 1.0);
        assert_eq!(target.iter().sum::<f64>(), 1.0);
        assert!(encode(10).is_err());
    }

    #[test]
    fn decode_prefers_last_clean_output() {
        let activations = [0.95, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.97];
        let decisions: Vec<_> = activations
            .iter()
            .copied()
            .map(Decision::from_activation)
            .collect();
        assert_eq!(decode(&decisions, &activations), Some(0));
    }

    #[test]
    fn decode_falls_back_to_highest_activation() {
        let activations = [0.2, 0.6, 0.3, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let decisions: Vec<_> = activations
            .iter()
            .copied()
            .map(Decision::from_activation)
            .collect();
        assert_eq!(decode(&decisions, &activations), Some(1));

        let mut last = [0.0; DIGITS];
        last[9] = 0.8;
        assert_eq!(decode(&[Decision::Uncertain; DIGITS], &last), Some(9));
        assert_eq!(decode(&[], &[]), None);
        assert_eq!(decode(&[Decision::Uncertain], &[f64::NAN]), None);
    }

    #[test]
    fn classifier_requires_ten_outputs() {
        let network = Network::new(4, 3, 2).unwrap();
        assert!(matches!(
            DigitClassifier::new(network),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn classifier_clones_share_network() {
        let classifier = DigitClassifier::new(Network::new(4, 3, DIGITS).unwrap()).unwrap();
        let other = classifier.clone();
        let input = [0.1, 0.2, 0.3, 0.4];
        assert_eq!(
            classifier.recognise(&input).unwrap(),
            other.recognise(&input).unwrap()
        );
        assert!(matches!(
            other.recognise(&[0.0]),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
