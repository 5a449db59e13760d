pub mod evaluate;
pub mod predict;
pub mod train;
pub mod transfer;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use burn::{
    backend::{Autodiff, Wgpu},
    prelude::*,
};
use burn_segmentation::{SegmentationModel, SegmentationModelConfig, UNet, UNetConfig};

pub type MyBackend = Wgpu<f32, i32>;
pub type MyAutodiffBackend = Autodiff<MyBackend>;

pub const MODEL_CONFIG: &str = "segmentation.json";
pub const BACKBONE_CONFIG: &str = "unet.json";
pub const WEIGHTS: &str = "model";

pub fn load_configs(artifact_dir: &Path) -> Result<(SegmentationModelConfig, UNetConfig)> {
    let model_config = SegmentationModelConfig::load(artifact_dir.join(MODEL_CONFIG))
        .map_err(|e| anyhow!("Failed to load {}: {:?}", MODEL_CONFIG, e))?;
    let unet_config = UNetConfig::load(artifact_dir.join(BACKBONE_CONFIG))
        .map_err(|e| anyhow!("Failed to load {}: {:?}", BACKBONE_CONFIG, e))?;

    Ok((model_config, unet_config))
}

pub fn save_configs(
    artifact_dir: &Path,
    model_config: &SegmentationModelConfig,
    unet_config: &UNetConfig,
) -> Result<()> {
    std::fs::create_dir_all(artifact_dir)?;
    model_config.save(artifact_dir.join(MODEL_CONFIG))?;
    unet_config.save(artifact_dir.join(BACKBONE_CONFIG))?;

    Ok(())
}

/// Rebuilds a model saved by `train` or `transfer`.
pub fn load_model<B: Backend>(
    artifact_dir: &Path,
    device: &B::Device,
) -> Result<SegmentationModel<B, UNet<B>>> {
    let (model_config, unet_config) = load_configs(artifact_dir)?;

    let model = model_config
        .init(unet_config.init::<B>(device), device)?
        .load_weights(artifact_dir.join(WEIGHTS), device)
        .with_context(|| format!("Failed to load weights from {}", artifact_dir.display()))?;

    Ok(model)
}
