use burn::prelude::*;
use derive_new::new;
use image::{Rgb, RgbImage};

use super::{SegmentationBackbone, SegmentationModel, resize::resize_to};
use crate::error::{SegmentationError, SegmentationResult};

#[cfg(feature = "dataset")]
use std::path::{Path, PathBuf};

#[cfg(feature = "dataset")]
use image::imageops::FilterType;
#[cfg(feature = "dataset")]
use tracing::{debug, info};

#[cfg(feature = "dataset")]
use crate::dataset::{IMAGE_EXTENSIONS, list_files, load_image};

#[derive(Config, Debug)]
pub struct PredictConfig {
    /// Blend the colored classes with the input image when writing results.
    #[config(default = false)]
    pub overlay: bool,
}

/// Predicted class of every pixel, row-major.
#[derive(new, Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    pub height: usize,
    pub width: usize,
    pub classes: Vec<usize>,
}

impl ClassMap {
    pub fn get(&self, y: usize, x: usize) -> usize {
        self.classes[y * self.width + x]
    }

    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            Rgb(class_color(self.get(y as usize, x as usize)))
        })
    }

    /// Colored classes averaged with `image`, which must have the map's size.
    pub fn overlay(&self, image: &RgbImage) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let color = class_color(self.get(y as usize, x as usize));
            let pixel = image.get_pixel(x, y).0;

            Rgb([
                ((pixel[0] as u16 + color[0] as u16) / 2) as u8,
                ((pixel[1] as u16 + color[1] as u16) / 2) as u8,
                ((pixel[2] as u16 + color[2] as u16) / 2) as u8,
            ])
        })
    }
}

/// Stable color of a class; the background class is black.
pub fn class_color(class: usize) -> [u8; 3] {
    if class == 0 {
        return [0, 0, 0];
    }

    let hash = (class as u32).wrapping_mul(0x9E37_79B1);
    [(hash >> 24) as u8, (hash >> 16) as u8, (hash >> 8) as u8]
}

pub(crate) fn class_indices<B: Backend, const D: usize>(
    classes: Tensor<B, D, Int>,
) -> SegmentationResult<Vec<usize>> {
    let values = classes
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| SegmentationError::TensorData(format!("{e:?}")))?;

    Ok(values.into_iter().map(|class| class as usize).collect())
}

impl<B: Backend, M: SegmentationBackbone<B>> SegmentationModel<B, M> {
    /// Class map `[height, width]` of one image given in the model's ordering.
    ///
    /// Images of another size are resized to the model input first.
    pub fn predict_segmentation(&self, image: Tensor<B, 3>) -> Tensor<B, 2, Int> {
        let classes = self.predict_classes(self.fit_input(image));
        let [_, height, width] = classes.dims();

        classes.reshape([height, width])
    }

    /// Class maps of several images, run as a single batch.
    pub fn predict_multiple(&self, images: Vec<Tensor<B, 3>>) -> Vec<Tensor<B, 2, Int>> {
        if images.is_empty() {
            return Vec::new();
        }

        let batch = Tensor::cat(
            images
                .into_iter()
                .map(|image| self.fit_input(image))
                .collect(),
            0,
        );
        let classes = self.predict_classes(batch);
        let [batch_size, height, width] = classes.dims();

        (0..batch_size)
            .map(|index| {
                classes
                    .clone()
                    .slice([index..index + 1, 0..height, 0..width])
                    .reshape([height, width])
            })
            .collect()
    }

    fn fit_input(&self, image: Tensor<B, 3>) -> Tensor<B, 4> {
        let ordering = self.ordering();
        let x = image.unsqueeze::<4>();
        let (_, size) = ordering.split_dims(x.dims());
        let input_size = [self.input_height(), self.input_width()];

        if size == input_size {
            return x;
        }

        let x = resize_to(ordering.to_channels_first(x), input_size);
        ordering.from_channels_first(x)
    }
}

#[cfg(feature = "dataset")]
impl<B: Backend, M: SegmentationBackbone<B>> SegmentationModel<B, M> {
    /// Predicts the classes of an image file.
    ///
    /// When `out_path` is given, the colored class map is written there.
    pub fn predict_file<P: AsRef<Path>>(
        &self,
        path: P,
        out_path: Option<&Path>,
        config: &PredictConfig,
        device: &B::Device,
    ) -> SegmentationResult<ClassMap> {
        let path = path.as_ref();
        let data_config = self.data_config()?;
        let [height, width] = data_config.image_size;
        let channels = data_config.input_mode.channels();

        let pixels = load_image(path, [height, width], &data_config.input_mode)?;
        let input = Tensor::<B, 3>::from_data(
            TensorData::new(pixels, Shape::new([height, width, channels]))
                .convert::<B::FloatElem>(),
            device,
        );

        let classes = self.predict_segmentation(data_config.ordering.from_hwc(input));
        let [map_height, map_width] = classes.dims();
        let class_map = ClassMap::new(map_height, map_width, class_indices(classes)?);

        if let Some(out_path) = out_path {
            let rendered = if config.overlay {
                let original = image::open(path)?
                    .resize_exact(map_width as u32, map_height as u32, FilterType::Triangle)
                    .to_rgb8();
                class_map.overlay(&original)
            } else {
                class_map.to_rgb()
            };

            rendered.save(out_path)?;
            debug!("Wrote segmentation of {:?} to {:?}", path, out_path);
        }

        Ok(class_map)
    }

    /// Predicts every image of `input_dir`, writing one PNG per image into
    /// `out_dir` under the image's file stem.
    pub fn predict_dir<P: AsRef<Path>>(
        &self,
        input_dir: P,
        out_dir: P,
        config: &PredictConfig,
        device: &B::Device,
    ) -> SegmentationResult<Vec<(PathBuf, ClassMap)>> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir)?;

        let inputs = list_files(input_dir.as_ref(), &IMAGE_EXTENSIONS)?;
        info!("Predicting {} images", inputs.len());

        inputs
            .into_iter()
            .map(|path| {
                let stem = path.file_stem().unwrap_or_default().to_string_lossy();
                let out_path = out_dir.join(format!("{stem}.png"));
                let class_map = self.predict_file(&path, Some(&out_path), config, device)?;

                Ok((path, class_map))
            })
            .collect()
    }
}
