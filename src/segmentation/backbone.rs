use burn::{module::ModuleDisplay, prelude::*};

/// A network producing raw per-class scores from channels-first images.
///
/// Implementors take `[batch, channels, height, width]` and return
/// `[batch, num_classes, out_height, out_width]`. The output does not need to
/// match the input's spatial size and must not be normalized, since
/// [`SegmentationModel`](super::SegmentationModel) resizes it and applies the
/// softmax itself.
pub trait SegmentationBackbone<B: Backend>: Module<B> + ModuleDisplay {
    fn forward_scores(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}
