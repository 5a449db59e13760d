use std::{marker::PhantomData, path::PathBuf};

use burn::{
    module::Ignored,
    prelude::*,
    record::CompactRecorder,
    tensor::activation::softmax,
};
use tracing::debug;

use super::{backbone::SegmentationBackbone, resize::resize_to};
use crate::{
    config::ImageOrdering,
    error::{SegmentationError, SegmentationResult},
};

#[derive(Config, Debug)]
pub struct SegmentationModelConfig {
    pub input_size: [usize; 2],
    #[config(default = 3)]
    pub input_channels: usize,
    #[config(default = "ImageOrdering::ChannelsFirst")]
    pub ordering: ImageOrdering,
    #[config(default = "String::new()")]
    pub model_name: String,
}

impl SegmentationModelConfig {
    /// Wraps `backbone` into a segmentation model.
    ///
    /// The backbone is run once on a blank image to discover how many classes
    /// it scores and at which resolution.
    pub fn init<B: Backend, M: SegmentationBackbone<B>>(
        &self,
        backbone: M,
        device: &B::Device,
    ) -> SegmentationResult<SegmentationModel<B, M>> {
        let [input_height, input_width] = self.input_size;

        let probe = Tensor::<B, 4>::zeros(
            [1, self.input_channels, input_height, input_width],
            device,
        );
        let [_, n_classes, raw_height, raw_width] = backbone.forward_scores(probe).dims();

        if n_classes == 0 {
            return Err(SegmentationError::NoClasses);
        }

        debug!(
            n_classes,
            raw_height, raw_width, input_height, input_width, "Probed backbone output"
        );

        Ok(SegmentationModel {
            backbone,
            input_height,
            input_width,
            input_channels: self.input_channels,
            output_height: input_height,
            output_width: input_width,
            n_classes,
            ordering: Ignored(self.ordering.clone()),
            model_name: Ignored(self.model_name.clone()),
            _backend: PhantomData,
        })
    }
}

/// A backbone whose scores are resized to the input resolution and turned
/// into per-pixel class probabilities.
#[derive(Module, Debug)]
pub struct SegmentationModel<B: Backend, M> {
    backbone: M,
    input_height: usize,
    input_width: usize,
    input_channels: usize,
    output_height: usize,
    output_width: usize,
    n_classes: usize,
    ordering: Ignored<ImageOrdering>,
    model_name: Ignored<String>,
    _backend: PhantomData<B>,
}

impl<B: Backend, M> SegmentationModel<B, M> {
    pub fn input_height(&self) -> usize {
        self.input_height
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_height(&self) -> usize {
        self.output_height
    }

    pub fn output_width(&self) -> usize {
        self.output_width
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn model_name(&self) -> &str {
        &self.model_name.0
    }

    pub fn ordering(&self) -> &ImageOrdering {
        &self.ordering.0
    }

    pub fn backbone(&self) -> &M {
        &self.backbone
    }

    pub fn into_backbone(self) -> M {
        self.backbone
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Ignored(name.into());
        self
    }
}

impl<B: Backend, M: SegmentationBackbone<B>> SegmentationModel<B, M> {
    /// Unnormalized class scores, `[batch, n_classes, height, width]`,
    /// regardless of the model's ordering.
    pub fn forward_logits(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.ordering.0.to_channels_first(images);
        let x = self.backbone.forward_scores(x);

        resize_to(x, [self.output_height, self.output_width])
    }

    /// Per-pixel class probabilities laid out in the model's ordering.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let probabilities = softmax(self.forward_logits(images), 1);

        self.ordering.0.from_channels_first(probabilities)
    }

    /// Most likely class of every pixel, `[batch, height, width]`.
    pub fn predict_classes(&self, images: Tensor<B, 4>) -> Tensor<B, 3, Int> {
        let logits = self.forward_logits(images);
        let [batch_size, _, height, width] = logits.dims();

        logits.argmax(1).reshape([batch_size, height, width])
    }

    pub fn save_weights<P: Into<PathBuf>>(&self, path: P) -> SegmentationResult<()> {
        self.clone()
            .save_file(path, &CompactRecorder::new())
            .map_err(|e| SegmentationError::Recorder(format!("{e:?}")))
    }

    pub fn load_weights<P: Into<PathBuf>>(
        self,
        path: P,
        device: &B::Device,
    ) -> SegmentationResult<Self> {
        self.load_file(path, &CompactRecorder::new(), device)
            .map_err(|e| SegmentationError::Recorder(format!("{e:?}")))
    }
}
