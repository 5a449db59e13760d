use std::path::PathBuf;

use anyhow::Result;
use burn::backend::wgpu::WgpuDevice;
use burn_segmentation::PredictConfig;
use clap::Args;
use tracing::info;

use super::{MyBackend, load_model};

#[derive(Args)]
pub struct PredictArgs {
    /// Directory written by `train` or `transfer`.
    #[arg(short, long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    /// An image file or a directory of images.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output PNG for a single image, or output directory.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Blend the class colors with the input image.
    #[arg(long)]
    pub overlay: bool,
}

pub fn run(args: &PredictArgs) -> Result<()> {
    let device = WgpuDevice::default();
    let model = load_model::<MyBackend>(&args.artifact_dir, &device)?;
    let config = PredictConfig::new().with_overlay(args.overlay);

    if args.input.is_dir() {
        let results = model.predict_dir(&args.input, &args.output, &config, &device)?;
        info!(
            "Segmented {} images into {}",
            results.len(),
            args.output.display()
        );
    } else {
        let class_map = model.predict_file(&args.input, Some(&args.output), &config, &device)?;
        info!(
            "Segmented {} ({}x{}) into {}",
            args.input.display(),
            class_map.width,
            class_map.height,
            args.output.display()
        );
    }

    Ok(())
}
