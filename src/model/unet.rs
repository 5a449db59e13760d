use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
};

use super::blocks::{
    ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
};
use crate::segmentation::SegmentationBackbone;

/// U-Net emitting raw class scores at the input resolution.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    encoders: Vec<EncoderBlock<B>>,
    bottleneck: ConvBlock<B>,
    decoders: Vec<DecoderBlock<B>>,
    head: Conv2d<B>,
}

#[derive(Config, Debug)]
pub struct UNetConfig {
    pub num_classes: usize,
    #[config(default = "3")]
    pub input_channels: usize,
    #[config(default = "64")]
    pub base_channels: usize,
    /// Number of pooling levels.
    #[config(default = "4")]
    pub depth: usize,
    #[config(default = "0.2")]
    pub dropout: f64,
    #[config(default = "true")]
    pub batch_norm: bool,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        self.assertions();

        let mut encoders = Vec::with_capacity(self.depth);
        let mut channels = self.input_channels;
        for level in 0..self.depth {
            let filters = self.base_channels << level;
            encoders.push(EncoderBlockConfig::new(self.conv_block(channels, filters)).init(device));
            channels = filters;
        }

        let bottleneck_filters = self.base_channels << self.depth;
        let bottleneck = self.conv_block(channels, bottleneck_filters).init(device);
        channels = bottleneck_filters;

        let mut decoders = Vec::with_capacity(self.depth);
        for level in (0..self.depth).rev() {
            let filters = self.base_channels << level;
            decoders.push(
                DecoderBlockConfig::new(channels, filters, self.conv_block(filters * 2, filters))
                    .init(device),
            );
            channels = filters;
        }

        UNet {
            encoders,
            bottleneck,
            decoders,
            head: Conv2dConfig::new([self.base_channels, self.num_classes], [1, 1]).init(device),
        }
    }

    fn conv_block(&self, input_channels: usize, num_filters: usize) -> ConvBlockConfig {
        ConvBlockConfig::new(input_channels, num_filters)
            .with_dropout(self.dropout)
            .with_batch_norm(self.batch_norm)
    }

    fn assertions(&self) {
        assert!(
            self.depth >= 1,
            "U-Net needs at least one pooling level. Got {}",
            self.depth
        );
        assert!(
            self.input_channels > 0 && self.base_channels > 0,
            "Channel counts must be positive. Got input {} and base {}",
            self.input_channels,
            self.base_channels
        );
    }
}

impl<B: Backend> UNet<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = images;
        let mut skips = Vec::with_capacity(self.encoders.len());

        for encoder in &self.encoders {
            let (down, skip_features) = encoder.forward(x);
            skips.push(skip_features);
            x = down;
        }

        let mut x = self.bottleneck.forward(x);

        for (decoder, skip_features) in self.decoders.iter().zip(skips.into_iter().rev()) {
            x = decoder.forward(x, skip_features);
        }

        self.head.forward(x)
    }
}

impl<B: Backend> SegmentationBackbone<B> for UNet<B> {
    fn forward_scores(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ImageOrdering,
        segmentation::{SegmentationModelConfig, TransferReport, transfer_weights},
    };
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::Distribution,
    };

    type TestBackend = NdArray;

    fn tiny(num_classes: usize) -> UNetConfig {
        UNetConfig::new(num_classes)
            .with_base_channels(4)
            .with_depth(2)
    }

    #[test]
    fn scores_keep_input_resolution_for_odd_sizes() {
        let device = Default::default();
        let unet = tiny(3).init::<TestBackend>(&device);
        let images = Tensor::random([1, 3, 10, 14], Distribution::Default, &device);

        assert_eq!(unet.forward(images).dims(), [1, 3, 10, 14]);
    }

    #[test]
    fn odd_sizes_backpropagate_through_the_decoder() {
        let device = Default::default();
        let unet = tiny(2)
            .with_batch_norm(false)
            .init::<Autodiff<TestBackend>>(&device);
        let images = Tensor::random([1, 3, 10, 14], Distribution::Default, &device);

        let grads = unet.forward(images).sum().backward();

        assert!(unet.head.weight.grad(&grads).is_some());
    }

    #[test]
    fn wraps_into_a_channels_last_segmentation_model() {
        let device = Default::default();
        let unet = tiny(2)
            .with_input_channels(1)
            .with_batch_norm(false)
            .init::<TestBackend>(&device);

        let model = SegmentationModelConfig::new([12, 12])
            .with_input_channels(1)
            .with_ordering(ImageOrdering::ChannelsLast)
            .with_model_name("unet".to_string())
            .init(unet, &device)
            .unwrap();

        assert_eq!(model.n_classes(), 2);
        let images = Tensor::random([2, 12, 12, 1], Distribution::Default, &device);
        assert_eq!(model.forward(images).dims(), [2, 12, 12, 2]);
    }

    #[test]
    fn pretrained_features_transfer_to_a_new_head() {
        let device = Default::default();
        let pretrained = tiny(3).init::<TestBackend>(&device);
        let fresh = tiny(5).init::<TestBackend>(&device);

        let (_, report) = transfer_weights(&pretrained, &fresh, true).unwrap();

        // Only the 1x1 head's weight and bias depend on the class count.
        assert_eq!(report.skipped, 2);
        assert!(report.copied > 0);
        assert_ne!(report, TransferReport::new(0, 0));
    }

    #[test]
    #[should_panic = "U-Net needs at least one pooling level"]
    fn zero_depth_is_rejected() {
        UNetConfig::new(2).with_depth(0).init::<TestBackend>(&Default::default());
    }
}
