use std::path::PathBuf;

use anyhow::Result;
use burn::{backend::wgpu::WgpuDevice, config::Config};
use clap::Args;

use super::{MyBackend, load_model};

#[derive(Args)]
pub struct EvaluateArgs {
    #[arg(short, long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    #[arg(long)]
    pub images: PathBuf,

    #[arg(long)]
    pub annotations: PathBuf,

    /// Also write the scores as JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub fn run(args: &EvaluateArgs) -> Result<()> {
    let device = WgpuDevice::default();
    let model = load_model::<MyBackend>(&args.artifact_dir, &device)?;

    let report = model.evaluate_dirs(&args.images, &args.annotations, &device)?;

    println!("Frequency weighted IU: {:.4}", report.frequency_weighted_iu);
    println!("Mean IU: {:.4}", report.mean_iu);
    for (class, score) in report.class_wise_iu.iter().enumerate() {
        println!("  class {class}: {score:.4}");
    }

    if let Some(path) = &args.report {
        report.save(path)?;
    }

    Ok(())
}
