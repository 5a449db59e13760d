mod batcher;
mod folder;
mod io;

use burn::prelude::*;

use crate::{
    config::ImageOrdering,
    error::{SegmentationError, SegmentationResult},
    segmentation::SegmentationModel,
};

pub use batcher::{SegmentationBatch, SegmentationBatcher};
pub use folder::{SegmentationDataset, SegmentationItem, SegmentationItemRaw};
pub use io::{
    ANNOTATION_EXTENSIONS, IMAGE_EXTENSIONS, has_extension, list_files, load_annotation,
    load_image,
};

#[derive(Config, Debug, PartialEq, Eq)]
pub enum InputMode {
    Grayscale,
    RGB,
}

impl InputMode {
    pub fn channels(&self) -> usize {
        match self {
            InputMode::Grayscale => 1,
            InputMode::RGB => 3,
        }
    }

    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(InputMode::Grayscale),
            3 => Some(InputMode::RGB),
            _ => None,
        }
    }
}

/// How images and annotations are turned into model inputs and targets.
#[derive(Config, Debug)]
pub struct SegmentationConfig {
    pub image_size: [usize; 2],
    pub n_classes: usize,
    #[config(default = "InputMode::RGB")]
    pub input_mode: InputMode,
    #[config(default = "ImageOrdering::ChannelsFirst")]
    pub ordering: ImageOrdering,
    /// Skip images without annotation instead of failing.
    #[config(default = false)]
    pub ignore_non_matching: bool,
}

impl<B: Backend, M> SegmentationModel<B, M> {
    /// Data settings matching this model's input.
    ///
    /// Image files decode to grayscale or RGB only, so models expecting any
    /// other channel count are rejected.
    pub fn data_config(&self) -> SegmentationResult<SegmentationConfig> {
        let input_mode = InputMode::from_channels(self.input_channels())
            .ok_or(SegmentationError::UnsupportedInputChannels(self.input_channels()))?;

        Ok(SegmentationConfig::new(
            [self.input_height(), self.input_width()],
            self.n_classes(),
        )
        .with_input_mode(input_mode)
        .with_ordering(self.ordering().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{
        SegmentationModelConfig,
        testing::{StridedBackboneConfig, TestBackend},
    };

    #[test]
    fn data_config_follows_the_model_input() {
        let device = Default::default();
        let backbone = StridedBackboneConfig::new(1, 3).init::<TestBackend>(&device);
        let model = SegmentationModelConfig::new([8, 6])
            .with_input_channels(1)
            .with_ordering(ImageOrdering::ChannelsLast)
            .init(backbone, &device)
            .unwrap();

        let config = model.data_config().unwrap();

        assert_eq!(config.image_size, [8, 6]);
        assert_eq!(config.n_classes, 3);
        assert_eq!(config.input_mode, InputMode::Grayscale);
        assert_eq!(config.ordering, ImageOrdering::ChannelsLast);
    }

    #[test]
    fn channel_counts_without_an_image_mode_are_rejected() {
        let device = Default::default();
        let backbone = StridedBackboneConfig::new(4, 2).init::<TestBackend>(&device);
        let model = SegmentationModelConfig::new([8, 8])
            .with_input_channels(4)
            .init(backbone, &device)
            .unwrap();

        assert!(matches!(
            model.data_config(),
            Err(SegmentationError::UnsupportedInputChannels(4))
        ));
    }
}
