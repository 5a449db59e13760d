use std::path::{Path, PathBuf};

use burn::data::dataset::{
    Dataset, InMemDataset,
    transform::{Mapper, MapperDataset},
};
use tracing::{debug, error};

use super::{
    SegmentationConfig,
    io::{
        ANNOTATION_EXTENSIONS, IMAGE_EXTENSIONS, has_extension, list_files, load_annotation,
        load_image,
    },
};
use crate::error::{SegmentationError, SegmentationResult};

/// An image/annotation pair on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationItemRaw {
    pub image_path: PathBuf,
    pub annotation_path: PathBuf,
}

/// A decoded pair, already resized to the model input.
#[derive(Debug, Clone)]
pub struct SegmentationItem {
    /// HWC pixels in `[0, 1]`.
    pub image: Vec<f32>,
    /// Row-major class indices.
    pub mask: Vec<usize>,
    pub image_path: PathBuf,
}

struct PathToSegmentationItem {
    config: SegmentationConfig,
}

impl PathToSegmentationItem {
    fn load(&self, item: &SegmentationItemRaw) -> SegmentationResult<SegmentationItem> {
        let image = load_image(
            &item.image_path,
            self.config.image_size,
            &self.config.input_mode,
        )?;
        let mask = load_annotation(
            &item.annotation_path,
            self.config.image_size,
            self.config.n_classes,
        )?;

        Ok(SegmentationItem {
            image,
            mask,
            image_path: item.image_path.clone(),
        })
    }
}

impl Mapper<SegmentationItemRaw, SegmentationItem> for PathToSegmentationItem {
    fn map(&self, item: &SegmentationItemRaw) -> SegmentationItem {
        self.load(item).unwrap_or_else(|err| {
            error!("Failed to load {:?}: {}", item.image_path, err);

            let [height, width] = self.config.image_size;
            SegmentationItem {
                image: vec![0.0; height * width * self.config.input_mode.channels()],
                mask: vec![0; height * width],
                image_path: item.image_path.clone(),
            }
        })
    }
}

type SegmentationDatasetMapper =
    MapperDataset<InMemDataset<SegmentationItemRaw>, PathToSegmentationItem, SegmentationItemRaw>;

/// Image/annotation pairs decoded lazily on access.
pub struct SegmentationDataset {
    dataset: SegmentationDatasetMapper,
    pairs: Vec<SegmentationItemRaw>,
}

impl Dataset<SegmentationItem> for SegmentationDataset {
    fn get(&self, index: usize) -> Option<SegmentationItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl SegmentationDataset {
    /// Create a dataset from explicit `(image, annotation)` pairs.
    pub fn new_with_pairs<P: AsRef<Path>>(
        pairs: Vec<(P, P)>,
        config: SegmentationConfig,
    ) -> SegmentationResult<Self> {
        let pairs = pairs
            .into_iter()
            .map(|(image_path, annotation_path)| {
                let image_path = image_path.as_ref().to_path_buf();
                Self::check_extension(&image_path, &IMAGE_EXTENSIONS)?;

                let annotation_path = annotation_path.as_ref().to_path_buf();
                Self::check_extension(&annotation_path, &ANNOTATION_EXTENSIONS)?;

                Ok(SegmentationItemRaw {
                    image_path,
                    annotation_path,
                })
            })
            .collect::<SegmentationResult<Vec<_>>>()?;

        Ok(Self::with_items(pairs, config))
    }

    /// Pair every image of `images_dir` with the annotation of the same file
    /// stem in `annotations_dir`.
    ///
    /// An image without annotation is an error unless
    /// [`SegmentationConfig::ignore_non_matching`] is set.
    pub fn new_from_folders<P: AsRef<Path>>(
        images_dir: P,
        annotations_dir: P,
        config: SegmentationConfig,
    ) -> SegmentationResult<Self> {
        let images_dir = images_dir.as_ref();
        let annotations_dir = annotations_dir.as_ref();

        for dir in [images_dir, annotations_dir] {
            if !dir.is_dir() {
                return Err(SegmentationError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Directory does not exist: {:?}", dir),
                )));
            }
        }

        let annotations = list_files(annotations_dir, &ANNOTATION_EXTENSIONS)?;
        let mut pairs = Vec::new();

        for image_path in list_files(images_dir, &IMAGE_EXTENSIONS)? {
            let stem = image_path.file_stem();
            let annotation_path = annotations.iter().find(|path| path.file_stem() == stem);

            match annotation_path {
                Some(annotation_path) => pairs.push(SegmentationItemRaw {
                    image_path,
                    annotation_path: annotation_path.clone(),
                }),
                None if config.ignore_non_matching => {
                    debug!("Skipping {:?}, no matching annotation", image_path);
                }
                None => return Err(SegmentationError::MissingAnnotation(image_path)),
            }
        }

        if pairs.is_empty() {
            return Err(SegmentationError::EmptyDataset(images_dir.to_path_buf()));
        }

        Ok(Self::with_items(pairs, config))
    }

    pub fn pairs(&self) -> &[SegmentationItemRaw] {
        &self.pairs
    }

    fn with_items(pairs: Vec<SegmentationItemRaw>, config: SegmentationConfig) -> Self {
        let dataset = InMemDataset::new(pairs.clone());
        let dataset = MapperDataset::new(dataset, PathToSegmentationItem { config });

        Self { dataset, pairs }
    }

    fn check_extension(path: &Path, extensions: &[&str]) -> SegmentationResult<()> {
        if has_extension(path, extensions) {
            Ok(())
        } else {
            Err(SegmentationError::InvalidFileExtension(
                path.extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ))
        }
    }
}
