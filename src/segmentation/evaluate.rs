use burn::prelude::*;

#[cfg(feature = "dataset")]
use std::path::Path;

#[cfg(feature = "dataset")]
use burn::data::{dataloader::batcher::Batcher, dataset::Dataset};
#[cfg(feature = "dataset")]
use tracing::info;

#[cfg(feature = "dataset")]
use super::{SegmentationBackbone, SegmentationModel, predict::class_indices};
#[cfg(feature = "dataset")]
use crate::{
    dataset::{SegmentationBatcher, SegmentationDataset, SegmentationItem},
    error::SegmentationResult,
};

const EPSILON: f64 = 1e-12;

/// Intersection-over-union scores of a segmentation model.
#[derive(Config, Debug)]
pub struct EvaluationReport {
    pub frequency_weighted_iu: f64,
    pub mean_iu: f64,
    pub class_wise_iu: Vec<f64>,
}

/// Per-class pixel counts accumulated over predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionCounts {
    true_positives: Vec<u64>,
    false_positives: Vec<u64>,
    false_negatives: Vec<u64>,
    pixels: Vec<u64>,
}

impl ConfusionCounts {
    pub fn new(n_classes: usize) -> Self {
        Self {
            true_positives: vec![0; n_classes],
            false_positives: vec![0; n_classes],
            false_negatives: vec![0; n_classes],
            pixels: vec![0; n_classes],
        }
    }

    pub fn n_classes(&self) -> usize {
        self.pixels.len()
    }

    /// Counts one image. Indices at or beyond `n_classes` are ignored.
    pub fn update(&mut self, predictions: &[usize], targets: &[usize]) {
        let n_classes = self.n_classes();

        for (&predicted, &target) in predictions.iter().zip(targets) {
            if target < n_classes {
                self.pixels[target] += 1;
            }

            if predicted == target {
                if predicted < n_classes {
                    self.true_positives[predicted] += 1;
                }
                continue;
            }

            if predicted < n_classes {
                self.false_positives[predicted] += 1;
            }
            if target < n_classes {
                self.false_negatives[target] += 1;
            }
        }
    }

    pub fn class_wise_iu(&self) -> Vec<f64> {
        (0..self.n_classes())
            .map(|class| {
                let tp = self.true_positives[class] as f64;
                let fp = self.false_positives[class] as f64;
                let fn_ = self.false_negatives[class] as f64;

                tp / (tp + fp + fn_ + EPSILON)
            })
            .collect()
    }

    /// Mean over every class, including classes never seen.
    pub fn mean_iu(&self) -> f64 {
        let scores = self.class_wise_iu();
        if scores.is_empty() {
            return 0.0;
        }

        scores.iter().sum::<f64>() / scores.len() as f64
    }

    /// Class scores weighted by each class's share of ground-truth pixels.
    pub fn frequency_weighted_iu(&self) -> f64 {
        let total: u64 = self.pixels.iter().sum();
        if total == 0 {
            return 0.0;
        }

        self.class_wise_iu()
            .iter()
            .zip(&self.pixels)
            .map(|(score, &pixels)| score * pixels as f64 / total as f64)
            .sum()
    }

    pub fn report(&self) -> EvaluationReport {
        EvaluationReport::new(
            self.frequency_weighted_iu(),
            self.mean_iu(),
            self.class_wise_iu(),
        )
    }
}

#[cfg(feature = "dataset")]
impl<B: Backend, M: SegmentationBackbone<B>> SegmentationModel<B, M> {
    /// Scores the model against every item of `dataset`.
    pub fn evaluate_segmentation<D: Dataset<SegmentationItem>>(
        &self,
        dataset: &D,
        device: &B::Device,
    ) -> SegmentationResult<EvaluationReport> {
        let batcher = SegmentationBatcher::<B>::new(device.clone(), self.data_config()?);
        let mut counts = ConfusionCounts::new(self.n_classes());

        for item in dataset.iter() {
            let targets = item.mask.clone();
            let batch = batcher.batch(vec![item]);
            let predictions = class_indices(self.predict_classes(batch.images))?;

            counts.update(&predictions, &targets);
        }

        let report = counts.report();
        info!(
            mean_iu = report.mean_iu,
            frequency_weighted_iu = report.frequency_weighted_iu,
            "Evaluated {} images",
            dataset.len()
        );

        Ok(report)
    }

    /// Scores the model against the image/annotation pairs of two folders.
    pub fn evaluate_dirs<P: AsRef<Path>>(
        &self,
        images_dir: P,
        annotations_dir: P,
        device: &B::Device,
    ) -> SegmentationResult<EvaluationReport> {
        let config = self.data_config()?;
        let dataset = SegmentationDataset::new_from_folders(images_dir, annotations_dir, config)?;

        self.evaluate_segmentation(&dataset, device)
    }
}
