use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::warn;

use super::InputMode;
use crate::error::SegmentationResult;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
pub const ANNOTATION_EXTENSIONS: [&str; 2] = ["png", "bmp"];

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|&valid_ext| valid_ext.eq_ignore_ascii_case(ext))
        })
}

/// Files of `dir` with one of `extensions`, sorted by path.
pub fn list_files(dir: &Path, extensions: &[&str]) -> SegmentationResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Decodes an image, resizes it to `[height, width]` and returns its pixels
/// in HWC order scaled to `[0, 1]`.
pub fn load_image(
    path: &Path,
    [height, width]: [usize; 2],
    mode: &InputMode,
) -> SegmentationResult<Vec<f32>> {
    let image =
        image::open(path)?.resize_exact(width as u32, height as u32, FilterType::Triangle);

    let pixels = match mode {
        InputMode::RGB => image.to_rgb8().into_raw(),
        InputMode::Grayscale => image.to_luma8().into_raw(),
    };

    Ok(pixels.into_iter().map(|v| v as f32 / 255.0).collect())
}

/// Reads the class index of every pixel from the first channel of an
/// annotation image, resized with nearest-neighbour sampling.
///
/// Indices outside `0..n_classes` are mapped to the background class 0.
pub fn load_annotation(
    path: &Path,
    [height, width]: [usize; 2],
    n_classes: usize,
) -> SegmentationResult<Vec<usize>> {
    let annotation = image::open(path)?
        .resize_exact(width as u32, height as u32, FilterType::Nearest)
        .to_rgb8();

    let mut out_of_range = 0;
    let mask = annotation
        .pixels()
        .map(|pixel| {
            let class = pixel.0[0] as usize;
            if class < n_classes {
                class
            } else {
                out_of_range += 1;
                0
            }
        })
        .collect();

    if out_of_range > 0 {
        warn!(
            "{} pixels of {:?} are labelled outside of the {} known classes",
            out_of_range, path, n_classes
        );
    }

    Ok(mask)
}
