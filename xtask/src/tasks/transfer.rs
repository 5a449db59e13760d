use std::path::PathBuf;

use anyhow::Result;
use burn::backend::wgpu::WgpuDevice;
use burn_segmentation::{UNetConfig, transfer_weights};
use clap::Args;
use tracing::info;

use super::{MyBackend, WEIGHTS, load_configs, load_model, save_configs};

#[derive(Args)]
pub struct TransferArgs {
    /// Trained model to copy from.
    #[arg(long)]
    pub source_dir: PathBuf,

    /// Where the new model is written.
    #[arg(long)]
    pub destination_dir: PathBuf,

    /// Class count of the new model.
    #[arg(short, long)]
    pub num_classes: usize,

    #[arg(long)]
    pub model_name: Option<String>,

    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: &TransferArgs) -> Result<()> {
    let device = WgpuDevice::default();
    let (model_config, source_unet) = load_configs(&args.source_dir)?;
    let source = load_model::<MyBackend>(&args.source_dir, &device)?;

    let unet_config = UNetConfig {
        num_classes: args.num_classes,
        ..source_unet
    };
    let model_config = match &args.model_name {
        Some(name) => model_config.with_model_name(name.clone()),
        None => model_config,
    };

    let (backbone, report) = transfer_weights(
        source.backbone(),
        &unet_config.init::<MyBackend>(&device),
        !args.quiet,
    )?;
    let destination = model_config.init(backbone, &device)?;

    save_configs(&args.destination_dir, &model_config, &unet_config)?;
    destination.save_weights(args.destination_dir.join(WEIGHTS))?;

    info!(
        "Wrote {} with {} classes ({} parameters copied, {} skipped)",
        args.destination_dir.display(),
        destination.n_classes(),
        report.copied,
        report.skipped
    );
    Ok(())
}
