use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error(
        "Both models should have same number of layers: source has {source_layers}, destination has {destination_layers}"
    )]
    LayerCountMismatch {
        source_layers: usize,
        destination_layers: usize,
    },

    #[error("Backbone produced no output channels, at least one class is required")]
    NoClasses,

    #[error("Images with {0} channels cannot be read from files, expected 1 or 3")]
    UnsupportedInputChannels(usize),

    #[error("No annotation found for image `{0:?}`")]
    MissingAnnotation(PathBuf),

    #[error("No valid image-annotation pairs found in `{0:?}`")]
    EmptyDataset(PathBuf),

    #[error("Invalid file extension: `{0}`")]
    InvalidFileExtension(String),

    #[error("I/O error: `{0}`")]
    Io(#[from] std::io::Error),

    #[error("Image error: `{0}`")]
    Image(#[from] image::ImageError),

    #[error("Recorder error: `{0}`")]
    Recorder(String),

    #[error("Tensor data error: `{0}`")]
    TensorData(String),
}

pub type SegmentationResult<T> = Result<T, SegmentationError>;
