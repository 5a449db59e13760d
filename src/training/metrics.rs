use std::marker::PhantomData;

use burn::prelude::*;
use burn::train::metric::state::{FormatOptions, NumericMetricState};
use burn::train::metric::{Metric, MetricEntry, MetricMetadata, Numeric};
use derive_new::new;
use tracing::warn;

use crate::segmentation::ConfusionCounts;

/// Mean intersection over union of the classes, in percent.
#[derive(Default)]
pub struct IoUMetric<B: Backend> {
    state: NumericMetricState,
    _b: PhantomData<B>,
}

#[derive(new)]
pub struct IoUInput<B: Backend> {
    /// Class scores, `[batch, n_classes, height, width]`.
    outputs: Tensor<B, 4>,
    /// Class indices, `[batch, 1, height, width]`.
    targets: Tensor<B, 4, Int>,
}

impl<B: Backend> IoUMetric<B> {
    pub fn new() -> Self {
        Self::default()
    }

    fn batch_iou(input: &IoUInput<B>) -> Option<f64> {
        let [_, n_classes, _, _] = input.outputs.dims();

        let predictions = input.outputs.clone().argmax(1).into_data().convert::<i64>();
        let targets = input.targets.clone().into_data().convert::<i64>();

        let predictions = predictions.to_vec::<i64>().ok()?;
        let targets = targets.to_vec::<i64>().ok()?;

        let mut counts = ConfusionCounts::new(n_classes);
        counts.update(
            &predictions.into_iter().map(|c| c as usize).collect::<Vec<_>>(),
            &targets.into_iter().map(|c| c as usize).collect::<Vec<_>>(),
        );

        Some(counts.mean_iu())
    }
}

impl<B: Backend> Metric for IoUMetric<B> {
    type Input = IoUInput<B>;
    const NAME: &'static str = "IoU";

    fn update(&mut self, input: &IoUInput<B>, _metadata: &MetricMetadata) -> MetricEntry {
        let [batch_size, _, _, _] = input.outputs.dims();

        let iou = Self::batch_iou(input).unwrap_or_else(|| {
            warn!("Could not read segmentation outputs, counting the batch as 0 IoU");
            0.0
        });

        self.state.update(
            100.0 * iou,
            batch_size,
            FormatOptions::new(Self::NAME).unit("%").precision(2),
        )
    }

    fn clear(&mut self) {
        self.state.reset()
    }
}

impl<B: Backend> Numeric for IoUMetric<B> {
    fn value(&self) -> f64 {
        self.state.value()
    }
}
