use std::vec;

use burn::{
    module::{ModuleMapper, ModuleVisitor, ParamId},
    prelude::*,
};
use derive_new::new;
use tracing::{debug, info, trace};

use crate::error::{SegmentationError, SegmentationResult};

/// Outcome of [`transfer_weights`], counted in parameter tensors.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub copied: usize,
    pub skipped: usize,
}

#[derive(Default)]
struct WeightCollector {
    weights: Vec<TensorData>,
}

impl<B: Backend> ModuleVisitor<B> for WeightCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.weights.push(tensor.to_data());
    }
}

#[derive(Default)]
struct ShapeCollector {
    shapes: Vec<Vec<usize>>,
}

impl<B: Backend> ModuleVisitor<B> for ShapeCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

struct WeightCopier {
    weights: vec::IntoIter<TensorData>,
    copied: usize,
    skipped: usize,
}

impl<B: Backend> ModuleMapper<B> for WeightCopier {
    fn map_float<const D: usize>(&mut self, id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let Some(weights) = self.weights.next() else {
            return tensor;
        };

        let dims = tensor.dims();
        if weights.shape.as_slice() != dims.as_slice() {
            trace!(?id, source = ?weights.shape, destination = ?dims, "Skipping parameter");
            self.skipped += 1;
            return tensor;
        }

        let copied = Tensor::from_data(weights.convert::<B::FloatElem>(), &tensor.device());
        self.copied += 1;

        if tensor.is_require_grad() {
            copied.require_grad()
        } else {
            copied
        }
    }
}

/// Returns a copy of `destination` holding the float parameters of `source`
/// wherever the paired tensors have the same shape.
///
/// Parameters are paired in visiting order. Both modules must hold the same
/// number of parameter tensors; otherwise
/// [`SegmentationError::LayerCountMismatch`] is returned. `destination` itself
/// is never modified. The two modules may live on different backends.
///
/// Burn visits parameter tensors without layer boundaries, so each tensor is
/// copied or skipped on its own. A layer whose weight changed shape but whose
/// bias did not ends up half copied: the bias is taken from `source` and the
/// weight kept from `destination`.
pub fn transfer_weights<B1, B2, S, D>(
    source: &S,
    destination: &D,
    verbose: bool,
) -> SegmentationResult<(D, TransferReport)>
where
    B1: Backend,
    B2: Backend,
    S: Module<B1>,
    D: Module<B2>,
{
    let mut collector = WeightCollector::default();
    source.visit(&mut collector);

    let mut shapes = ShapeCollector::default();
    destination.visit(&mut shapes);

    if collector.weights.len() != shapes.shapes.len() {
        return Err(SegmentationError::LayerCountMismatch {
            source_layers: collector.weights.len(),
            destination_layers: shapes.shapes.len(),
        });
    }

    if verbose {
        info!("Copying weights");
    }

    let mut copier = WeightCopier {
        weights: collector.weights.into_iter(),
        copied: 0,
        skipped: 0,
    };
    let destination = destination.clone().map(&mut copier);
    let report = TransferReport::new(copier.copied, copier.skipped);

    if verbose {
        info!(
            "Copied weights of {} layers and skipped {} layers",
            report.copied, report.skipped
        );
    } else {
        debug!(copied = report.copied, skipped = report.skipped, "Transferred weights");
    }

    Ok((destination, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{
        SegmentationBackbone,
        testing::{StridedBackboneConfig, TestBackend},
    };
    use burn::{
        backend::Autodiff,
        nn::{Linear, LinearConfig},
    };

    #[derive(Module, Debug)]
    struct TwoLayers<B: Backend> {
        first: Linear<B>,
        second: Linear<B>,
    }

    fn two_layers<B: Backend>(hidden: usize, out: usize, device: &B::Device) -> TwoLayers<B> {
        TwoLayers {
            first: LinearConfig::new(4, hidden).init(device),
            second: LinearConfig::new(hidden, out).init(device),
        }
    }

    fn values<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> Vec<f32> {
        tensor.to_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn identical_architectures_copy_every_parameter() {
        let device = Default::default();
        let source = two_layers::<TestBackend>(8, 3, &device);
        let destination = two_layers::<TestBackend>(8, 3, &device);

        let (destination, report) = transfer_weights(&source, &destination, false).unwrap();

        assert_eq!(report, TransferReport::new(4, 0));
        assert_eq!(
            values(&destination.first.weight.val()),
            values(&source.first.weight.val())
        );
        assert_eq!(
            values(&destination.second.weight.val()),
            values(&source.second.weight.val())
        );
    }

    #[test]
    fn mismatched_shapes_are_skipped() {
        let device = Default::default();
        let source = two_layers::<TestBackend>(8, 3, &device);
        let destination = two_layers::<TestBackend>(8, 5, &device);
        let untouched = values(&destination.second.weight.val());

        let (destination, report) = transfer_weights(&source, &destination, true).unwrap();

        // The head's weight and bias differ in shape, the first layer matches.
        assert_eq!(report, TransferReport::new(2, 2));
        assert_eq!(
            values(&destination.first.weight.val()),
            values(&source.first.weight.val())
        );
        assert_eq!(values(&destination.second.weight.val()), untouched);
    }

    #[test]
    fn different_parameter_counts_are_rejected() {
        let device = Default::default();
        let source = two_layers::<TestBackend>(8, 3, &device);
        let destination = StridedBackboneConfig::new(4, 3).init::<TestBackend>(&device);
        let before = values(&destination.conv.weight.val());

        let result = transfer_weights(&source, &destination, true);

        assert!(matches!(
            result,
            Err(SegmentationError::LayerCountMismatch {
                source_layers: 4,
                destination_layers: 2,
            })
        ));

        // The rejected destination is still there and unchanged.
        assert_eq!(values(&destination.conv.weight.val()), before);
        let images = Tensor::<TestBackend, 4>::ones([1, 4, 6, 6], &device);
        assert_eq!(destination.forward_scores(images).dims(), [1, 3, 3, 3]);
    }

    #[test]
    fn layers_can_be_partially_copied() {
        let device = Default::default();
        let source = LinearConfig::new(4, 8).init::<TestBackend>(&device);
        let destination = LinearConfig::new(5, 8).init::<TestBackend>(&device);

        let (destination, report) = transfer_weights(&source, &destination, false).unwrap();

        // The bias keeps its shape, the weight does not.
        assert_eq!(report, TransferReport::new(1, 1));
        assert_eq!(
            values(&destination.bias.as_ref().unwrap().val()),
            values(&source.bias.as_ref().unwrap().val())
        );
    }

    #[test]
    fn transfer_crosses_backends_and_keeps_gradients() {
        let device = Default::default();
        let source = two_layers::<TestBackend>(6, 2, &device);
        let destination = two_layers::<Autodiff<TestBackend>>(6, 2, &device);

        let (destination, report) = transfer_weights(&source, &destination, false).unwrap();

        assert_eq!(report.copied, 4);
        assert!(destination.first.weight.val().is_require_grad());
        assert_eq!(
            values(&destination.first.bias.as_ref().unwrap().val()),
            values(&source.first.bias.as_ref().unwrap().val())
        );
    }
}
