mod backbone;
mod model;
mod resize;
mod transfer;

pub mod evaluate;
pub mod predict;

pub use backbone::SegmentationBackbone;
pub use evaluate::{ConfusionCounts, EvaluationReport};
pub use model::{SegmentationModel, SegmentationModelConfig};
pub use predict::{ClassMap, PredictConfig};
pub use resize::{resize_image, resize_to};
pub use transfer::{TransferReport, transfer_weights};

#[cfg(test)]
pub(crate) mod testing {
    use std::marker::PhantomData;

    use burn::{
        backend::NdArray,
        nn::conv::{Conv2d, Conv2dConfig},
        prelude::*,
    };

    use super::SegmentationBackbone;

    pub type TestBackend = NdArray;

    /// Scores classes at half resolution, so the model has to resize.
    #[derive(Module, Debug)]
    pub struct StridedBackbone<B: Backend> {
        pub conv: Conv2d<B>,
    }

    #[derive(Config, Debug)]
    pub struct StridedBackboneConfig {
        input_channels: usize,
        num_classes: usize,
    }

    impl StridedBackboneConfig {
        pub fn init<B: Backend>(&self, device: &B::Device) -> StridedBackbone<B> {
            StridedBackbone {
                conv: Conv2dConfig::new([self.input_channels, self.num_classes], [2, 2])
                    .with_stride([2, 2])
                    .init(device),
            }
        }
    }

    impl<B: Backend> SegmentationBackbone<B> for StridedBackbone<B> {
        fn forward_scores(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
            self.conv.forward(images)
        }
    }

    #[derive(Module, Debug)]
    pub struct EmptyBackbone<B: Backend> {
        phantom: PhantomData<B>,
    }

    impl<B: Backend> EmptyBackbone<B> {
        pub fn new() -> Self {
            Self {
                phantom: PhantomData,
            }
        }
    }

    impl<B: Backend> SegmentationBackbone<B> for EmptyBackbone<B> {
        fn forward_scores(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
            let [batch_size, _, height, width] = images.dims();
            Tensor::zeros([batch_size, 0, height, width], &images.device())
        }
    }
}
