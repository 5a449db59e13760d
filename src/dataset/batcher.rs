use burn::{data::dataloader::batcher::Batcher, prelude::*};

use super::{SegmentationConfig, SegmentationItem};

#[derive(Clone)]
pub struct SegmentationBatcher<B: Backend> {
    device: B::Device,
    config: SegmentationConfig,
}

impl<B: Backend> SegmentationBatcher<B> {
    pub fn new(device: B::Device, config: SegmentationConfig) -> Self {
        Self { device, config }
    }
}

#[derive(Clone, Debug)]
pub struct SegmentationBatch<B: Backend> {
    /// Images laid out in the configured ordering.
    pub images: Tensor<B, 4, Float>,
    /// Class indices, `[batch, 1, height, width]`.
    pub masks: Tensor<B, 4, Int>,
}

impl<B: Backend> Batcher<SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<SegmentationItem>) -> SegmentationBatch<B> {
        let [height, width] = self.config.image_size;
        let channels = self.config.input_mode.channels();

        let mut images = Vec::with_capacity(items.len());
        let mut masks = Vec::with_capacity(items.len());

        for item in items {
            let image = Tensor::<B, 3>::from_data(
                TensorData::new(item.image, Shape::new([height, width, channels]))
                    .convert::<B::FloatElem>(),
                &self.device,
            );

            let mask: Vec<i64> = item.mask.into_iter().map(|class| class as i64).collect();
            let mask = Tensor::<B, 3, Int>::from_data(
                TensorData::new(mask, Shape::new([1, height, width])).convert::<B::IntElem>(),
                &self.device,
            );

            images.push(self.config.ordering.from_hwc(image));
            masks.push(mask);
        }

        let images: Tensor<B, 4> = Tensor::stack::<4>(images, 0);
        let masks: Tensor<B, 4, Int> = Tensor::stack::<4>(masks, 0);

        SegmentationBatch { images, masks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ImageOrdering, dataset::InputMode};
    use burn::backend::NdArray;
    use std::path::PathBuf;

    type TestBackend = NdArray;

    fn item(value: f32, class: usize) -> SegmentationItem {
        SegmentationItem {
            image: vec![value; 2 * 3 * 3],
            mask: vec![class; 2 * 3],
            image_path: PathBuf::from(format!("{class}.png")),
        }
    }

    #[test]
    fn batches_channels_first_by_default() {
        let config = SegmentationConfig::new([2, 3], 4);
        let batcher = SegmentationBatcher::<TestBackend>::new(Default::default(), config);

        let batch = batcher.batch(vec![item(0.5, 1), item(0.25, 3)]);

        assert_eq!(batch.images.dims(), [2, 3, 2, 3]);
        assert_eq!(batch.masks.dims(), [2, 1, 2, 3]);

        let masks = batch.masks.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(&masks[..6], &[1; 6]);
        assert_eq!(&masks[6..], &[3; 6]);
    }

    #[test]
    fn batches_channels_last_when_asked() {
        let config = SegmentationConfig::new([2, 3], 4).with_ordering(ImageOrdering::ChannelsLast);
        let batcher = SegmentationBatcher::<TestBackend>::new(Default::default(), config);

        let batch = batcher.batch(vec![item(0.5, 0)]);

        assert_eq!(batch.images.dims(), [1, 2, 3, 3]);
    }

    #[test]
    fn grayscale_items_have_one_channel() {
        let config = SegmentationConfig::new([2, 3], 2).with_input_mode(InputMode::Grayscale);
        let batcher = SegmentationBatcher::<TestBackend>::new(Default::default(), config);
        let item = SegmentationItem {
            image: vec![1.0; 6],
            mask: vec![0; 6],
            image_path: PathBuf::new(),
        };

        let batch = batcher.batch(vec![item]);

        assert_eq!(batch.images.dims(), [1, 1, 2, 3]);
    }
}
