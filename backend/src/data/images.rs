use crate::data::schema::ImageSchema;
use crate::error::PipelineError;
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::{Array1, Array4};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Every model in the system consumes 128x128 RGB images.
pub const IMAGE_SIZE: u32 = 128;

/// Decodes image bytes, resizes to exactly `IMAGE_SIZE` square, and
/// converts to RGB. The same routine runs at dataset-preparation time and
/// on uploaded images at inference time.
pub fn load_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    let img = image::load_from_memory(bytes)?;
    let resized = img.resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle);
    Ok(resized.to_rgb8())
}

/// Flattens to row-major (height, width, channel) `f32` pixels in [0, 1].
pub fn normalize_hwc(img: &RgbImage) -> Vec<f32> {
    img.as_raw().iter().map(|&b| b as f32 / 255.0).collect()
}

/// All samples of a labelled image tree as (path, label) pairs, negative
/// class first, sorted within each class for reproducible ordering.
pub fn class_samples(root: &Path, schema: &ImageSchema) -> Result<Vec<(PathBuf, u8)>, PipelineError> {
    let mut samples = Vec::new();
    for (class, label) in [(schema.negative_class, 0u8), (schema.positive_class, 1u8)] {
        let dir = root.join(class);
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        entries.sort();
        samples.extend(entries.into_iter().map(|path| (path, label)));
    }
    Ok(samples)
}

/// The preprocessed image corpus of one disease: normalized pixels of
/// shape (n, 128, 128, 3) paired with binary labels, persisted as a
/// single binary dump.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageArchive {
    pub images: Array4<f32>,
    pub labels: Array1<u8>,
}

impl ImageArchive {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let file = File::create(path)?;
        bincode::serialize_into(file, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path)?;
        Ok(bincode::deserialize_from(file)?)
    }
}

/// Walks the class subdirectories under `root`, preprocessing every
/// readable image into the archive. Unreadable files are logged and
/// skipped rather than failing the run.
pub fn build_archive(root: &Path, schema: &ImageSchema) -> Result<ImageArchive, PipelineError> {
    let size = IMAGE_SIZE as usize;
    let mut pixels = Vec::new();
    let mut labels = Vec::new();

    for (path, label) in class_samples(root, schema)? {
        let bytes = std::fs::read(&path)?;
        match load_rgb(&bytes) {
            Ok(img) => {
                pixels.extend(normalize_hwc(&img));
                labels.push(label);
            }
            Err(e) => {
                log::warn!("skipping unreadable image {}: {}", path.display(), e);
            }
        }
    }

    let images = Array4::from_shape_vec((labels.len(), size, size, 3), pixels)?;
    Ok(ImageArchive {
        images,
        labels: Array1::from_vec(labels),
    })
}
