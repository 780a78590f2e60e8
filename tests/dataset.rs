use std::{collections::HashSet, fs, ptr};

use digitnet::{DataSet, Error, Partition, Partitioner, Sample, SampleStore};

fn store(n: usize) -> SampleStore {
    let samples = (0..n)
        .map(|i| Sample::new(vec![i as f64], vec![(i % 2) as f64]))
        .collect();
    SampleStore::from_samples(samples, 1, 1).unwrap()
}

fn positions(store: &SampleStore, subset: &[&Sample]) -> Vec<usize> {
    subset
        .iter()
        .map(|s| {
            store
                .samples()
                .iter()
                .position(|x| ptr::eq(x, *s))
                .unwrap()
        })
        .collect()
}

fn assert_disjoint(store: &SampleStore, data_set: &DataSet<'_>) {
    let training: HashSet<_> = positions(store, &data_set.training).into_iter().collect();
    let generalization: HashSet<_> = positions(store, &data_set.generalization)
        .into_iter()
        .collect();
    let validation: HashSet<_> = positions(store, &data_set.validation).into_iter().collect();
    assert_eq!(training.len(), data_set.training.len());
    assert!(training.is_disjoint(&generalization));
    assert!(training.is_disjoint(&validation));
    assert!(generalization.is_disjoint(&validation));
    assert!(training.len() + generalization.len() + validation.len() <= store.len());
}

#[test]
fn load_sample_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("samples.csv");
    fs::write(&path, "0,0,0\n0,1,1\n1,0,1\n1,1,0\n").unwrap();

    let store = SampleStore::load(&path, 2, 1).unwrap();
    assert_eq!(store.len(), 4);
    assert_eq!(store.n_inputs(), 2);
    assert_eq!(store.n_outputs(), 1);
    assert_eq!(store.samples()[1], Sample::new(vec![0.0, 1.0], vec![1.0]));
}

#[test]
fn short_line_empties_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.csv");
    let bad = dir.path().join("bad.csv");
    fs::write(&good, "0,0,0\n1,1,0\n").unwrap();
    fs::write(&bad, "0,0,0\n0,1\n1,1,0\n").unwrap();

    let mut store = SampleStore::new(2, 1);
    store.load_data_file(&good).unwrap();
    assert_eq!(store.len(), 2);

    let err = store.load_data_file(&bad).unwrap_err();
    assert!(matches!(err, Error::DataFormat { line: 2, .. }), "{err}");
    assert_eq!(store.len(), 0);
    assert!(store.is_empty());
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SampleStore::new(2, 1);
    let err = store
        .load_data_file(dir.path().join("missing.csv"))
        .unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }), "{err}");
    assert!(store.is_empty());
}

#[test]
fn static_partition_keeps_file_order() {
    let store = store(10);
    let mut partitioner = Partitioner::new(&store, Partition::default()).unwrap();
    assert_eq!(partitioner.num_training_sets(), 1);

    let data_set = partitioner.create_data_set().unwrap();
    assert_eq!(positions(&store, &data_set.training), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(positions(&store, &data_set.generalization), vec![6, 7]);
    assert_eq!(positions(&store, &data_set.validation), vec![8, 9]);
    assert_disjoint(&store, &data_set);

    let err = partitioner.create_data_set().unwrap_err();
    assert!(matches!(
        err,
        Error::ExhaustedPartitions {
            requested: 2,
            available: 1
        }
    ));

    partitioner.reset();
    assert_eq!(partitioner.remaining(), 1);
    assert!(partitioner.create_data_set().is_ok());
}

#[test]
fn static_partition_with_custom_ratio() {
    let store = store(20);
    let mut partitioner = Partitioner::new(
        &store,
        Partition::Static {
            training_ratio: 0.5,
        },
    )
    .unwrap();
    let data_set = partitioner.create_data_set().unwrap();
    assert_eq!(data_set.training.len(), 10);
    assert_eq!(data_set.generalization.len(), 5);
    assert_eq!(data_set.validation.len(), 5);
}

#[test]
fn growing_partition_extends_training_window() {
    let store = store(10);
    let mut partitioner =
        Partitioner::new(&store, Partition::Growing { step_percent: 20.0 }).unwrap();
    assert_eq!(partitioner.num_training_sets(), 3);

    let mut previous = 0;
    for expected in [2, 4, 6] {
        let data_set = partitioner.create_data_set().unwrap();
        assert_eq!(data_set.training.len(), expected);
        assert!(data_set.training.len() > previous);
        previous = data_set.training.len();
        assert_eq!(positions(&store, &data_set.generalization), vec![6, 7]);
        assert_eq!(positions(&store, &data_set.validation), vec![8, 9]);
        assert_disjoint(&store, &data_set);
    }
    assert!(matches!(
        partitioner.create_data_set(),
        Err(Error::ExhaustedPartitions { .. })
    ));
}

#[test]
fn windowing_partition_slides() {
    let store = store(10);
    let policy = Partition::Windowing {
        window_size: 3,
        step_size: 1,
        wrap: false,
    };
    let mut partitioner = Partitioner::new(&store, policy).unwrap();
    assert_eq!(partitioner.num_training_sets(), 4);

    for start in 0..4 {
        let data_set = partitioner.create_data_set().unwrap();
        assert_eq!(
            positions(&store, &data_set.training),
            vec![start, start + 1, start + 2]
        );
        assert_eq!(positions(&store, &data_set.generalization), vec![6, 7]);
        assert_eq!(positions(&store, &data_set.validation), vec![8, 9]);
        assert_disjoint(&store, &data_set);
    }
    assert_eq!(partitioner.remaining(), 0);
    assert!(partitioner.create_data_set().is_err());
}

#[test]
fn windowing_partition_wraps() {
    let store = store(10);
    let policy = Partition::Windowing {
        window_size: 4,
        step_size: 2,
        wrap: true,
    };
    let mut partitioner = Partitioner::new(&store, policy).unwrap();
    assert_eq!(partitioner.num_training_sets(), 3);

    let mut last = None;
    while partitioner.remaining() > 0 {
        let data_set = partitioner.create_data_set().unwrap();
        assert_eq!(data_set.training.len(), 4);
        assert_disjoint(&store, &data_set);
        last = Some(positions(&store, &data_set.training));
    }
    assert_eq!(last, Some(vec![4, 5, 0, 1]));
}

#[test]
fn windowing_partition_needs_room_for_the_window() {
    let store = store(10);
    let policy = Partition::Windowing {
        window_size: 7,
        step_size: 1,
        wrap: false,
    };
    let err = Partitioner::new(&store, policy).unwrap_err();
    assert!(matches!(err, Error::InsufficientData { samples: 10, .. }), "{err}");
}

#[test]
fn too_few_samples() {
    for policy in [
        Partition::default(),
        Partition::Growing { step_percent: 10.0 },
        Partition::Windowing {
            window_size: 4,
            step_size: 1,
            wrap: false,
        },
    ] {
        let small = store(2);
        let err = Partitioner::new(&small, policy).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }), "{policy:?}: {err}");
    }
}
