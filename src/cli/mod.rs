// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case. Results are printed here; nothing is computed here.
//
//   resnet-transfer download [--weights]
//   resnet-transfer train [--backend ndarray] [--epochs 25] ...
//   resnet-transfer predict <image or dir>...
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DownloadArgs, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "resnet-transfer",
    version,
    about = "Transfer learning with a pretrained ResNet-18: freeze the body, retrain the head."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Download(args) => run_download(args),
            Commands::Train(args) => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_download(args: DownloadArgs) -> Result<()> {
    use crate::data::download::DatasetDownloader;
    use crate::ml::pretrained::PretrainedWeights;

    let dir = DatasetDownloader::new(args.url, args.data_dir)
        .with_extracted_dir(args.dataset_name)
        .ensure()?;
    println!("Dataset ready at '{}'", dir.display());

    if args.weights {
        let path = PretrainedWeights::resnet18(args.weights_dir).fetch()?;
        println!("Weights ready at '{}'", path.display());
    }
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training with data in: {}", args.data_dir);

    let summary = TrainUseCase::new(args.into()).execute()?;
    println!("Training complete. {summary}");
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case = PredictUseCase::new(&args.checkpoint_dir, args.backend.map(Into::into))?;
    for prediction in use_case.predict(&args.inputs)? {
        println!("{prediction}");
    }
    Ok(())
}
