use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use digitnet::{
    config::TrainingConfig, digit::DigitClassifier, Network, Partitioner, SampleStore, Trainer,
};
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

/// Train and run the digit recognition network.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a network on a sample file and save its weights.
    Train(TrainArgs),
    /// Report accuracy and error of saved weights over a sample file.
    Evaluate(RunArgs),
    /// Print the digit recognised for every sample in a file.
    Classify(RunArgs),
}

#[derive(Debug, Args)]
struct TrainArgs {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Sample file, overriding the configuration.
    #[arg(short, long)]
    data: Option<PathBuf>,
    /// Output weight file, overriding the configuration.
    #[arg(short, long)]
    weights: Option<PathBuf>,
    /// Training log file, overriding the configuration.
    #[arg(short, long)]
    log: Option<PathBuf>,
    /// Epoch limit per data set, overriding the configuration.
    #[arg(long)]
    max_epochs: Option<u64>,
    /// Seed for the initial weights, overriding the configuration.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// TOML configuration file describing the topology.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Weight file produced by `train`.
    #[arg(short, long)]
    weights: PathBuf,
    /// Sample file.
    #[arg(short, long)]
    data: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Evaluate(args) => evaluate(args),
        Command::Classify(args) => classify(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TrainingConfig> {
    match path {
        Some(path) => TrainingConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(TrainingConfig::default()),
    }
}

fn train(args: TrainArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(data) = args.data {
        config.data.path = Some(data);
    }
    if let Some(weights) = args.weights {
        config.output.weights = weights;
    }
    if let Some(log) = args.log {
        config.output.log = Some(log);
    }
    if let Some(max_epochs) = args.max_epochs {
        config.training.max_epochs = max_epochs;
    }
    if let Some(seed) = args.seed {
        config.training.seed = Some(seed);
    }
    let Some(data_path) = config.data.path.as_ref() else {
        bail!("no sample file given; set [data] path or pass --data");
    };

    let topology = config.network;
    let store = SampleStore::load(data_path, topology.inputs, topology.outputs)?;
    let mut partitioner = Partitioner::new(&store, config.data.partition)?;

    let mut network = match config.training.seed {
        Some(seed) => Network::with_rng(
            topology.inputs,
            topology.hidden,
            topology.outputs,
            &mut StdRng::seed_from_u64(seed),
        )?,
        None => Network::new(topology.inputs, topology.hidden, topology.outputs)?,
    };

    let mut trainer = Trainer::new(&mut network);
    let hyper = config.training;
    trainer.configure(hyper.learning_rate, hyper.momentum, hyper.batch)?;
    trainer.set_stopping_conditions(hyper.max_epochs, hyper.desired_accuracy)?;
    if let Some(log) = &config.output.log {
        trainer
            .enable_logging(log, config.output.log_resolution)
            .with_context(|| format!("creating training log {}", log.display()))?;
    }

    for set in 0..partitioner.num_training_sets() {
        let data_set = partitioner.create_data_set()?;
        tracing::info!(set = set + 1, of = partitioner.num_training_sets(), "training on data set");
        let outcome = trainer.train(&data_set)?;
        println!(
            "data set {}: {:?} after {} epochs, validation accuracy {:.2}%",
            set + 1,
            outcome.state,
            outcome.epochs,
            outcome.stats.validation.accuracy
        );
    }
    drop(trainer);

    network
        .save_weights(&config.output.weights)
        .with_context(|| format!("saving weights to {}", config.output.weights.display()))?;
    Ok(())
}

fn evaluate(args: RunArgs) -> anyhow::Result<()> {
    let topology = load_config(args.config.as_ref())?.network;
    let store = SampleStore::load(&args.data, topology.inputs, topology.outputs)?;
    let mut network = Network::from_weights_file(
        &args.weights,
        topology.inputs,
        topology.hidden,
        topology.outputs,
    )?;
    let samples: Vec<_> = store.samples().iter().collect();
    let stats = network.evaluate(&samples)?;
    println!(
        "{} samples: accuracy {:.2}%, mse {:.6}",
        store.len(),
        stats.accuracy,
        stats.mse
    );
    Ok(())
}

fn classify(args: RunArgs) -> anyhow::Result<()> {
    let topology = load_config(args.config.as_ref())?.network;
    let store = SampleStore::load(&args.data, topology.inputs, topology.outputs)?;
    let classifier =
        DigitClassifier::from_weights_file(&args.weights, topology.inputs, topology.hidden)?;
    for (index, sample) in store.samples().iter().enumerate() {
        match classifier.recognise(&sample.input)? {
            Some(digit) => println!("sample {}: {digit}", index + 1),
            None => println!("sample {}: ?", index + 1),
        }
    }
    Ok(())
}
