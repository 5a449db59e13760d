pub mod config;
pub mod error;
pub mod segmentation;

#[cfg(feature = "models")]
pub mod model;

#[cfg(feature = "dataset")]
pub mod dataset;

#[cfg(feature = "training")]
pub mod training;

pub use config::ImageOrdering;
pub use error::{SegmentationError, SegmentationResult};
pub use segmentation::{
    ClassMap, ConfusionCounts, EvaluationReport, PredictConfig, SegmentationBackbone,
    SegmentationModel, SegmentationModelConfig, TransferReport, resize_image, transfer_weights,
};

#[cfg(feature = "unet")]
pub use model::{UNet, UNetConfig};

#[cfg(feature = "dataset")]
pub use dataset::{InputMode, SegmentationConfig, SegmentationDataset};

#[cfg(feature = "training")]
pub use training::{IoUMetric, SegmentationOutput, TrainingConfig};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
