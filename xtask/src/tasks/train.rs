use std::path::PathBuf;

use anyhow::Result;
use burn::{backend::wgpu::WgpuDevice, optim::AdamConfig};
use burn_segmentation::{
    ImageOrdering, InputMode, SegmentationDataset, SegmentationModelConfig,
    TrainingConfig, UNetConfig,
};
use clap::Args;
use tracing::info;

use super::{MyAutodiffBackend, save_configs};

#[derive(Args)]
pub struct TrainArgs {
    #[arg(long)]
    pub train_images: PathBuf,

    #[arg(long)]
    pub train_annotations: PathBuf,

    #[arg(long)]
    pub val_images: PathBuf,

    #[arg(long)]
    pub val_annotations: PathBuf,

    #[arg(short, long, default_value_t = 5)]
    pub epochs: usize,

    #[arg(short, long, default_value_t = 2)]
    pub batch_size: usize,

    #[arg(short, long, default_value_t = 0.001)]
    pub lr: f64,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    #[arg(short, long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    #[arg(long, default_value_t = 64)]
    pub base_channels: usize,

    #[arg(long, default_value_t = 4)]
    pub depth: usize,

    #[arg(short, long)]
    pub num_classes: usize,

    #[arg(long, default_value_t = 256)]
    pub input_height: usize,

    #[arg(long, default_value_t = 256)]
    pub input_width: usize,

    /// Feed single-channel images instead of RGB.
    #[arg(long)]
    pub grayscale: bool,

    /// Lay images out as [batch, height, width, channels].
    #[arg(long)]
    pub channels_last: bool,

    /// Skip images without a matching annotation instead of failing.
    #[arg(long)]
    pub ignore_non_matching: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Weights to start from.
    #[arg(long)]
    pub pretrained: Option<PathBuf>,

    #[arg(long)]
    pub no_checkpoints: bool,

    /// Log progress instead of showing the terminal dashboard.
    #[arg(long)]
    pub no_dashboard: bool,

    #[arg(long, default_value = "unet")]
    pub model_name: String,
}

pub fn run(args: &TrainArgs) -> Result<()> {
    let device = WgpuDevice::default();

    let input_mode = if args.grayscale {
        InputMode::Grayscale
    } else {
        InputMode::RGB
    };
    let ordering = if args.channels_last {
        ImageOrdering::ChannelsLast
    } else {
        ImageOrdering::ChannelsFirst
    };

    let unet_config = UNetConfig::new(args.num_classes)
        .with_input_channels(input_mode.channels())
        .with_base_channels(args.base_channels)
        .with_depth(args.depth);
    let model_config = SegmentationModelConfig::new([args.input_height, args.input_width])
        .with_input_channels(input_mode.channels())
        .with_ordering(ordering)
        .with_model_name(args.model_name.clone());

    info!(
        "Creating U-Net with {} base channels and {} levels",
        args.base_channels, args.depth
    );
    let model = model_config.init(unet_config.init::<MyAutodiffBackend>(&device), &device)?;

    let data_config = model
        .data_config()?
        .with_ignore_non_matching(args.ignore_non_matching);
    let train_set = SegmentationDataset::new_from_folders(
        &args.train_images,
        &args.train_annotations,
        data_config.clone(),
    )?;
    let valid_set =
        SegmentationDataset::new_from_folders(&args.val_images, &args.val_annotations, data_config)?;

    let training_config = TrainingConfig::new(AdamConfig::new())
        .with_num_epochs(args.epochs)
        .with_batch_size(args.batch_size)
        .with_num_workers(args.num_workers)
        .with_seed(args.seed)
        .with_learning_rate(args.lr)
        .with_checkpoints(!args.no_checkpoints)
        .with_dashboard(!args.no_dashboard)
        .with_pretrained(args.pretrained.clone());

    model.train(
        &args.artifact_dir,
        &training_config,
        train_set,
        valid_set,
        &device,
    )?;

    // The artifact directory is recreated by training, so the configs come last.
    save_configs(&args.artifact_dir, &model_config, &unet_config)?;

    info!(
        "Training completed, artifacts in {}",
        args.artifact_dir.display()
    );
    Ok(())
}
