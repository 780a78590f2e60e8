use digitnet::{DataSet, Network, Sample, Trainer};
use rand::{rngs::StdRng, SeedableRng};

fn main() -> digitnet::Result<()> {
    tracing_subscriber::fmt().init();

    let mut rng = StdRng::seed_from_u64(0);
    let dataset = vec![
        Sample::new(vec![0.0, 0.0], vec![0.0]),
        Sample::new(vec![0.0, 1.0], vec![1.0]),
        Sample::new(vec![1.0, 0.0], vec![1.0]),
        Sample::new(vec![1.0, 1.0], vec![0.0]),
    ];
    let all: Vec<_> = dataset.iter().collect();
    let data_set = DataSet::new(all.clone(), all.clone(), all);

    let mut network = Network::with_rng(2, 2, 1, &mut rng)?;
    {
        let mut trainer = Trainer::new(&mut network);
        trainer.configure(0.7, 0.9, false)?;
        trainer.set_stopping_conditions(5000, 99.0)?;
        let outcome = trainer.train(&data_set)?;
        println!("{:?} after {} epochs", outcome.state, outcome.epochs);
    }

    for sample in &dataset {
        let pred = network.forward(&sample.input)?;
        println!("pred: {}", pred[0]);
        println!("real: {}", sample.target[0]);
        println!("================")
    }
    Ok(())
}
