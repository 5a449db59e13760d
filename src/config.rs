use burn::prelude::*;

/// Layout of image batches entering a segmentation model and of the
/// probabilities leaving it.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ImageOrdering {
    /// `[batch, channels, height, width]`, the layout Burn convolutions use.
    ChannelsFirst,
    /// `[batch, height, width, channels]`.
    ChannelsLast,
}

impl Default for ImageOrdering {
    fn default() -> Self {
        ImageOrdering::ChannelsFirst
    }
}

impl ImageOrdering {
    /// Index of the channel (or class) axis in a 4-D batch.
    pub fn channel_dim(&self) -> usize {
        match self {
            ImageOrdering::ChannelsFirst => 1,
            ImageOrdering::ChannelsLast => 3,
        }
    }

    /// Splits a batch shape into `(channels, [height, width])`.
    pub fn split_dims(&self, dims: [usize; 4]) -> (usize, [usize; 2]) {
        match self {
            ImageOrdering::ChannelsFirst => (dims[1], [dims[2], dims[3]]),
            ImageOrdering::ChannelsLast => (dims[3], [dims[1], dims[2]]),
        }
    }

    pub fn to_channels_first<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            ImageOrdering::ChannelsFirst => x,
            ImageOrdering::ChannelsLast => x.permute([0, 3, 1, 2]),
        }
    }

    pub fn from_channels_first<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            ImageOrdering::ChannelsFirst => x,
            ImageOrdering::ChannelsLast => x.permute([0, 2, 3, 1]),
        }
    }

    /// Arranges a single HWC image tensor in this ordering.
    pub fn from_hwc<B: Backend>(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        match self {
            ImageOrdering::ChannelsFirst => x.permute([2, 0, 1]),
            ImageOrdering::ChannelsLast => x,
        }
    }
}
