use std::thread;

use digitnet::{
    digit::{self, DigitClassifier, DIGITS},
    Network,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[test]
fn classifier_from_saved_weights_matches_network() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut network = Network::with_rng(16, 8, DIGITS, &mut rng).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.csv");
    network.save_weights(&path).unwrap();

    let classifier = DigitClassifier::from_weights_file(&path, 16, 8).unwrap();
    for _ in 0..10 {
        let input: Vec<f64> = (0..16).map(|_| rng.gen()).collect();
        let decisions = network.classify(&input).unwrap();
        let expected = digit::decode(
            &decisions,
            network.activations(digitnet::network::Layer::Output),
        );
        assert!(expected.is_some());
        assert_eq!(classifier.recognise(&input).unwrap(), expected);
    }
}

#[test]
fn classifier_is_shared_between_threads() {
    let classifier = DigitClassifier::new(Network::new(4, 4, DIGITS).unwrap()).unwrap();
    let inputs: Vec<Vec<f64>> = (0..8).map(|i| vec![f64::from(i) / 8.0; 4]).collect();
    let expected: Vec<_> = inputs
        .iter()
        .map(|input| classifier.recognise(input).unwrap())
        .collect();

    thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let classifier = classifier.clone();
                scope.spawn(move || classifier.recognise(input).unwrap())
            })
            .collect();
        let actual: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(actual, expected);
    });
}

#[test]
fn encoded_targets_decode_to_their_digit() {
    for d in 0..10u8 {
        let target = digit::encode(d).unwrap();
        let decisions: Vec<_> = target
            .iter()
            .copied()
            .map(digitnet::Decision::from_activation)
            .collect();
        assert_eq!(digit::decode(&decisions, &target), Some(d));
    }
}
