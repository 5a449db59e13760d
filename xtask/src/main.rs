use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod tasks;

#[derive(Parser)]
#[command(
    name = "burn-segmentation",
    about = "Image segmentation models on Burn",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a U-Net segmentation model
    Train(tasks::train::TrainArgs),
    /// Segment an image or a directory of images
    Predict(tasks::predict::PredictArgs),
    /// Score a trained model against annotated images
    Evaluate(tasks::evaluate::EvaluateArgs),
    /// Copy trained weights into a model with a different class count
    Transfer(tasks::transfer::TransferArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xtask=info,burn_segmentation=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Train(args) => tasks::train::run(args),
        Commands::Predict(args) => tasks::predict::run(args),
        Commands::Evaluate(args) => tasks::evaluate::run(args),
        Commands::Transfer(args) => tasks::transfer::run(args),
    }
}
