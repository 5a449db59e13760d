use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use burn::{
    backend::NdArray,
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::{AutodiffModule, ModuleDisplay},
    nn::loss::CrossEntropyLossConfig,
    optim::AdamConfig,
    prelude::*,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
    train::{LearnerBuilder, TrainOutput, TrainStep, ValidStep, metric::LossMetric},
};
use tracing::info;

use super::{IoUMetric, SegmentationOutput, renderer::TracingRenderer};
use crate::{
    dataset::{SegmentationBatch, SegmentationBatcher, SegmentationItem},
    error::SegmentationResult,
    segmentation::{SegmentationBackbone, SegmentationModel},
};

#[derive(Config)]
pub struct TrainingConfig {
    pub optimizer: AdamConfig,
    #[config(default = 5)]
    pub num_epochs: usize,
    #[config(default = 2)]
    pub batch_size: usize,
    #[config(default = 1)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
    /// Keep a checkpoint of every epoch in the artifact directory.
    #[config(default = true)]
    pub checkpoints: bool,
    /// Show Burn's terminal dashboard; progress goes to `tracing` otherwise.
    #[config(default = true)]
    pub dashboard: bool,
    /// Weights loaded into the model before training starts.
    pub pretrained: Option<PathBuf>,
}

fn create_artifact_dir(artifact_dir: &Path) {
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir).ok();
}

impl<B: Backend, M: SegmentationBackbone<B>> SegmentationModel<B, M> {
    /// Runs a batch and scores every pixel with a cross-entropy loss.
    pub fn forward_segmentation(&self, batch: SegmentationBatch<B>) -> SegmentationOutput<B> {
        let targets = batch.masks;
        let output = self.forward_logits(batch.images);

        let [batch_size, n_classes, height, width] = output.dims();
        let pixels = batch_size * height * width;

        let logits = output
            .clone()
            .permute([0, 2, 3, 1])
            .reshape([pixels, n_classes]);
        let labels = targets.clone().reshape([pixels]);

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(logits, labels);

        SegmentationOutput::new(loss, output, targets)
    }
}

impl<B, M> TrainStep<SegmentationBatch<B>, SegmentationOutput<B>> for SegmentationModel<B, M>
where
    B: AutodiffBackend,
    M: SegmentationBackbone<B> + AutodiffModule<B>,
    M::InnerModule: ModuleDisplay,
{
    fn step(&self, batch: SegmentationBatch<B>) -> TrainOutput<SegmentationOutput<B>> {
        let item = self.forward_segmentation(batch);
        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend, M: SegmentationBackbone<B>> ValidStep<SegmentationBatch<B>, SegmentationOutput<B>>
    for SegmentationModel<B, M>
{
    fn step(&self, batch: SegmentationBatch<B>) -> SegmentationOutput<B> {
        self.forward_segmentation(batch)
    }
}

impl<B, M> SegmentationModel<B, M>
where
    B: AutodiffBackend,
    M: SegmentationBackbone<B> + AutodiffModule<B> + Display + 'static,
    M::InnerModule: SegmentationBackbone<B::InnerBackend>,
{
    /// Fits the model with Burn's learner and returns the trained model.
    ///
    /// The artifact directory is recreated; it receives the training config
    /// as `config.json`, the learner's logs and checkpoints, and the final
    /// weights as `model.mpk`.
    pub fn train<P, DT, DV>(
        self,
        artifact_dir: P,
        config: &TrainingConfig,
        train_set: DT,
        valid_set: DV,
        device: &B::Device,
    ) -> SegmentationResult<Self>
    where
        P: AsRef<Path>,
        DT: Dataset<SegmentationItem> + 'static,
        DV: Dataset<SegmentationItem> + 'static,
    {
        let artifact_dir = artifact_dir.as_ref();
        create_artifact_dir(artifact_dir);

        B::seed(config.seed);
        config.save(artifact_dir.join("config.json"))?;

        let model = match &config.pretrained {
            Some(path) => {
                info!("Loading pretrained weights from {:?}", path);
                self.load_weights(path.clone(), device)?
            }
            None => self,
        };

        info!(
            "Training on {} images, validating on {}",
            train_set.len(),
            valid_set.len()
        );

        let data_config = model.data_config()?;
        let batcher_train = SegmentationBatcher::<B>::new(device.clone(), data_config.clone());
        let batcher_valid =
            SegmentationBatcher::<B::InnerBackend>::new(device.clone(), data_config);

        let dataloader_train = DataLoaderBuilder::new(batcher_train)
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers)
            .build(train_set);

        let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
            .batch_size(config.batch_size)
            .num_workers(config.num_workers)
            .build(valid_set);

        let mut learner = LearnerBuilder::new(artifact_dir)
            .metric_train_numeric(LossMetric::new())
            .metric_valid_numeric(LossMetric::new())
            .metric_train_numeric(IoUMetric::<NdArray>::new())
            .metric_valid_numeric(IoUMetric::<NdArray>::new())
            .devices(vec![device.clone()])
            .num_epochs(config.num_epochs)
            .summary();

        if config.checkpoints {
            learner = learner.with_file_checkpointer(CompactRecorder::new());
        }
        if !config.dashboard {
            learner = learner.renderer(TracingRenderer);
        }

        let learner = learner.build(model, config.optimizer.init(), config.learning_rate);
        let model_trained = learner.fit(dataloader_train, dataloader_valid);

        info!("Saving trained model to {:?}", artifact_dir.join("model"));
        model_trained.save_weights(artifact_dir.join("model"))?;

        Ok(model_trained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{
        SegmentationModelConfig,
        testing::{StridedBackboneConfig, TestBackend},
    };
    use burn::{backend::Autodiff, data::dataset::InMemDataset, tensor::Distribution};

    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn batch<B: Backend>(device: &B::Device) -> SegmentationBatch<B> {
        SegmentationBatch {
            images: Tensor::random([2, 3, 8, 8], Distribution::Default, device),
            masks: Tensor::<B, 4, Int>::zeros([2, 1, 8, 8], device),
        }
    }

    #[test]
    fn train_step_produces_gradients_for_the_backbone() {
        let device = Default::default();
        let backbone = StridedBackboneConfig::new(3, 3).init::<TestAutodiffBackend>(&device);
        let model = SegmentationModelConfig::new([8, 8])
            .init(backbone, &device)
            .unwrap();

        let output = TrainStep::step(&model, batch(&device));

        assert_eq!(output.item.output.dims(), [2, 3, 8, 8]);
        assert!(output.item.loss.clone().into_scalar().elem::<f64>().is_finite());
    }

    #[test]
    fn valid_step_scores_every_pixel() {
        let device = Default::default();
        let backbone = StridedBackboneConfig::new(3, 2).init::<TestBackend>(&device);
        let model = SegmentationModelConfig::new([8, 8])
            .init(backbone, &device)
            .unwrap();

        let output = ValidStep::step(&model, batch(&device));

        assert_eq!(output.targets.dims(), [2, 1, 8, 8]);
        let loss = output.loss.into_scalar().elem::<f64>();
        assert!(loss.is_finite() && loss >= 0.0);
    }

    fn items(count: usize) -> InMemDataset<SegmentationItem> {
        let items = (0..count)
            .map(|i| SegmentationItem {
                image: vec![(i % 2) as f32; 6 * 6 * 3],
                mask: vec![i % 2; 6 * 6],
                image_path: PathBuf::from(format!("{i}.png")),
            })
            .collect();

        InMemDataset::new(items)
    }

    #[test]
    fn train_fits_a_resizing_model_and_saves_artifacts() {
        let device = Default::default();
        let artifact_dir = std::env::temp_dir().join("burn-segmentation-train");
        // Half resolution scores are resized on every step.
        let backbone = StridedBackboneConfig::new(3, 2).init::<TestAutodiffBackend>(&device);
        let model = SegmentationModelConfig::new([6, 6])
            .init(backbone, &device)
            .unwrap();
        let config = TrainingConfig::new(AdamConfig::new())
            .with_num_epochs(1)
            .with_batch_size(2)
            .with_checkpoints(false)
            .with_dashboard(false);

        let trained = model
            .train(&artifact_dir, &config, items(4), items(2), &device)
            .unwrap();

        assert_eq!(trained.n_classes(), 2);
        assert!(artifact_dir.join("config.json").exists());
        assert!(artifact_dir.join("model.mpk").exists());
        let saved = TrainingConfig::load(artifact_dir.join("config.json")).unwrap();
        assert_eq!(saved.num_epochs, 1);
    }

    #[test]
    fn training_config_round_trips_through_json() {
        let config = TrainingConfig::new(AdamConfig::new())
            .with_num_epochs(3)
            .with_pretrained(Some(PathBuf::from("weights/model.mpk")));
        let path = std::env::temp_dir().join("burn-segmentation-training-config.json");

        config.save(&path).unwrap();
        let loaded = TrainingConfig::load(&path).unwrap();

        assert_eq!(loaded.num_epochs, 3);
        assert_eq!(loaded.batch_size, 2);
        assert_eq!(loaded.pretrained, Some(PathBuf::from("weights/model.mpk")));
    }
}
