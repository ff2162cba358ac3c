use crate::data::images::{self, IMAGE_SIZE};
use crate::data::schema::ImageSchema;
use crate::error::PipelineError;
use image::RgbImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tch::nn::{self, ModuleT, OptimizerConfig};
use tch::{Device, Reduction, Tensor};

pub const BATCH_SIZE: usize = 32;
pub const EPOCHS: usize = 10;
pub const LEARNING_RATE: f64 = 1e-4;
const VALIDATION_SPLIT: f64 = 0.2;
const SHUFFLE_SEED: u64 = 42;

/// Three conv/pool blocks into a small dense head with a single logit
/// output; sigmoid is applied at inference time.
fn net(vs: &nn::Path) -> nn::SequentialT {
    // 128 -> conv 126 -> pool 63 -> conv 61 -> pool 30 -> conv 28 -> pool 14
    let flat = 128 * 14 * 14;
    nn::seq_t()
        .add(nn::conv2d(vs / "conv1", 3, 32, 3, Default::default()))
        .add_fn(|xs| xs.relu().max_pool2d_default(2))
        .add(nn::conv2d(vs / "conv2", 32, 64, 3, Default::default()))
        .add_fn(|xs| xs.relu().max_pool2d_default(2))
        .add(nn::conv2d(vs / "conv3", 64, 128, 3, Default::default()))
        .add_fn(|xs| xs.relu().max_pool2d_default(2))
        .add_fn(|xs| xs.flat_view())
        .add(nn::linear(vs / "fc1", flat, 128, Default::default()))
        .add_fn(|xs| xs.relu())
        .add_fn_t(|xs, train| xs.dropout(0.5, train))
        .add(nn::linear(vs / "fc2", 128, 1, Default::default()))
}

/// A binary image classifier bound to 128x128x3 input. Weights live in
/// the var store and are persisted per disease.
pub struct CnnModel {
    vs: nn::VarStore,
    net: nn::SequentialT,
}

impl CnnModel {
    pub fn new() -> Self {
        let device = Device::cuda_if_available();
        let vs = nn::VarStore::new(device);
        let net = net(&vs.root());
        Self { vs, net }
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let mut model = Self::new();
        model.vs.load(path)?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        self.vs.save(path)?;
        Ok(())
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    /// Sigmoid probability that the image belongs to the positive class.
    pub fn predict(&self, img: &RgbImage) -> f32 {
        tch::no_grad(|| {
            let input = image_to_tensor(img).unsqueeze(0).to_device(self.device());
            let logit = self.net.forward_t(&input, false);
            logit.sigmoid().double_value(&[0, 0]) as f32
        })
    }
}

impl Default for CnnModel {
    fn default() -> Self {
        Self::new()
    }
}

/// CHW float tensor with pixels rescaled to [0, 1].
fn image_to_tensor(img: &RgbImage) -> Tensor {
    let size = IMAGE_SIZE as usize;
    let mut chw = vec![0f32; 3 * size * size];
    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            chw[c * size * size + y * size + x] = pixel.0[c] as f32 / 255.0;
        }
    }
    Tensor::from_slice(&chw).view([3, IMAGE_SIZE as i64, IMAGE_SIZE as i64])
}

/// Directory-fed batch source: shuffles the labelled sample list once,
/// holds out a validation slice, and loads/rescales images batch by
/// batch instead of materializing the corpus.
pub struct DirectoryGenerator {
    train: Vec<(PathBuf, u8)>,
    validation: Vec<(PathBuf, u8)>,
    batch_size: usize,
}

impl DirectoryGenerator {
    pub fn new(root: &Path, schema: &ImageSchema, batch_size: usize) -> Result<Self, PipelineError> {
        let mut samples = images::class_samples(root, schema)?;
        if samples.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "no images under {}",
                root.display()
            )));
        }
        let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
        samples.shuffle(&mut rng);
        let n_validation = (samples.len() as f64 * VALIDATION_SPLIT).round() as usize;
        let validation = samples.split_off(samples.len() - n_validation);
        Ok(Self {
            train: samples,
            validation,
            batch_size,
        })
    }

    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn validation_len(&self) -> usize {
        self.validation.len()
    }

    pub fn train_batches(&self, device: Device) -> BatchIter<'_> {
        BatchIter {
            samples: &self.train,
            batch_size: self.batch_size,
            device,
            pos: 0,
        }
    }

    pub fn validation_batches(&self, device: Device) -> BatchIter<'_> {
        BatchIter {
            samples: &self.validation,
            batch_size: self.batch_size,
            device,
            pos: 0,
        }
    }
}

pub struct BatchIter<'a> {
    samples: &'a [(PathBuf, u8)],
    batch_size: usize,
    device: Device,
    pos: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Result<(Tensor, Tensor), PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.samples.len() {
            let end = (self.pos + self.batch_size).min(self.samples.len());
            let chunk = &self.samples[self.pos..end];
            self.pos = end;

            let mut tensors = Vec::with_capacity(chunk.len());
            let mut labels = Vec::with_capacity(chunk.len());
            for (path, label) in chunk {
                let bytes = match std::fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(e) => return Some(Err(e.into())),
                };
                match images::load_rgb(&bytes) {
                    Ok(img) => {
                        tensors.push(image_to_tensor(&img));
                        labels.push(*label as f32);
                    }
                    Err(e) => {
                        log::warn!("skipping unreadable image {}: {}", path.display(), e);
                    }
                }
            }
            // A chunk can be empty if every file in it was unreadable.
            if tensors.is_empty() {
                continue;
            }
            let x = Tensor::stack(&tensors, 0).to_device(self.device);
            let y = Tensor::from_slice(&labels).view([-1, 1]).to_device(self.device);
            return Some(Ok((x, y)));
        }
        None
    }
}

/// Trains one CNN from a labelled image directory, logging per-epoch
/// training loss and validation accuracy.
pub fn train(root: &Path, schema: &ImageSchema, epochs: usize) -> Result<CnnModel, PipelineError> {
    let generator = DirectoryGenerator::new(root, schema, BATCH_SIZE)?;
    log::info!(
        "{}: {} training / {} validation images",
        schema.disease,
        generator.train_len(),
        generator.validation_len()
    );

    let model = CnnModel::new();
    let mut opt = nn::Adam::default().build(&model.vs, LEARNING_RATE)?;

    for epoch in 1..=epochs {
        let mut total_loss = 0f64;
        let mut batches = 0usize;
        for batch in generator.train_batches(model.device()) {
            let (x, y) = batch?;
            let logits = model.net.forward_t(&x, true);
            let loss =
                logits.binary_cross_entropy_with_logits::<Tensor>(&y, None, None, Reduction::Mean);
            opt.backward_step(&loss);
            total_loss += loss.double_value(&[]);
            batches += 1;
        }
        let accuracy = evaluate(&model, generator.validation_batches(model.device()))?;
        log::info!(
            "{}: epoch {}/{}: loss {:.4}, validation accuracy {:.4}",
            schema.disease,
            epoch,
            epochs,
            total_loss / batches.max(1) as f64,
            accuracy
        );
    }
    Ok(model)
}

fn evaluate(model: &CnnModel, batches: BatchIter) -> Result<f64, PipelineError> {
    let mut correct = 0usize;
    let mut total = 0usize;
    tch::no_grad(|| -> Result<(), PipelineError> {
        for batch in batches {
            let (x, y) = batch?;
            let probs = model.net.forward_t(&x, false).sigmoid();
            let n = probs.size()[0] as usize;
            let mut predicted = vec![0f32; n];
            probs.view([-1]).copy_data(&mut predicted, n);
            let mut actual = vec![0f32; n];
            y.view([-1]).copy_data(&mut actual, n);
            for (p, a) in predicted.iter().zip(&actual) {
                if (*p > 0.5) == (*a > 0.5) {
                    correct += 1;
                }
            }
            total += n;
        }
        Ok(())
    })?;
    Ok(if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::image_schema;
    use shared::Disease;
    use tch::Kind;
    use tempdir::TempDir;

    #[test]
    fn forward_produces_one_logit_per_sample() {
        let model = CnnModel::new();
        let x = Tensor::zeros([2, 3, 128, 128], (Kind::Float, model.device()));
        let logits = model.net.forward_t(&x, false);
        assert_eq!(logits.size(), vec![2, 1]);
    }

    #[test]
    fn predict_is_a_probability() {
        let model = CnnModel::new();
        let img = RgbImage::from_pixel(128, 128, image::Rgb([100, 150, 200]));
        let p = model.predict(&img);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn generator_splits_and_batches_all_samples() {
        let dir = TempDir::new("cnn").unwrap();
        let root = dir.path().join("pneumonia");
        for (class, color) in [("NORMAL", [10u8, 10, 10]), ("PNEUMONIA", [240, 240, 240])] {
            let class_dir = root.join(class);
            std::fs::create_dir_all(&class_dir).unwrap();
            for i in 0..5 {
                let img = RgbImage::from_pixel(32, 32, image::Rgb(color));
                img.save(class_dir.join(format!("{i}.png"))).unwrap();
            }
        }

        let schema = image_schema(Disease::Pneumonia).unwrap();
        let generator = DirectoryGenerator::new(&root, schema, 4).unwrap();
        assert_eq!(generator.train_len(), 8);
        assert_eq!(generator.validation_len(), 2);

        let mut seen = 0;
        for batch in generator.train_batches(Device::Cpu) {
            let (x, y) = batch.unwrap();
            assert_eq!(&x.size()[1..], [3, 128, 128]);
            assert_eq!(x.size()[0], y.size()[0]);
            seen += x.size()[0];
        }
        assert_eq!(seen, 8);
    }
}
