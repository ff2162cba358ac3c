use crate::error::PipelineError;
use linfa::prelude::*;
use linfa_ensemble::EnsembleLearnerParams;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Trees per fitted ensemble.
pub const ENSEMBLE_SIZE: usize = 100;

/// A bagged decision-tree ensemble for binary classification. The
/// positive-vote fraction doubles as the predicted probability, so the
/// same 0.5 threshold applies as for the image models.
#[derive(Serialize, Deserialize)]
pub struct ForestModel {
    trees: Vec<DecisionTree<f64, usize>>,
}

impl ForestModel {
    pub fn fit(train: &Dataset<f64, usize>, n_trees: usize) -> Result<Self, PipelineError> {
        let ensemble = EnsembleLearnerParams::new(DecisionTree::params())
            .ensemble_size(n_trees)
            .bootstrap_proportion(0.7)
            .fit(train)?;
        Ok(Self {
            trees: ensemble.models,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fraction of trees voting positive for one feature row.
    pub fn vote_fraction(&self, row: ArrayView1<f64>) -> f64 {
        let records = row.to_owned().insert_axis(Axis(0));
        let positives = self
            .trees
            .iter()
            .filter(|tree| tree.predict(&records)[0] == 1)
            .count();
        positives as f64 / self.trees.len().max(1) as f64
    }

    /// Majority-vote labels for a feature matrix.
    pub fn predict(&self, records: &Array2<f64>) -> Array1<usize> {
        let mut votes = vec![0usize; records.nrows()];
        for tree in &self.trees {
            let predictions = tree.predict(records);
            for (count, label) in votes.iter_mut().zip(predictions.iter()) {
                *count += *label;
            }
        }
        votes
            .into_iter()
            .map(|count| (count * 2 > self.trees.len()) as usize)
            .collect()
    }

    /// Held-out accuracy from the confusion matrix.
    pub fn accuracy(&self, valid: &Dataset<f64, usize>) -> Result<f32, PipelineError> {
        let predictions = self.predict(valid.records());
        let matrix = predictions.confusion_matrix(valid)?;
        Ok(matrix.accuracy())
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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use tempdir::TempDir;

    /// Two well-separated clusters, trivially learnable.
    fn toy_dataset() -> Dataset<f64, usize> {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            rows.extend([i as f64 * 0.1, 1.0]);
            labels.push(0usize);
            rows.extend([i as f64 * 0.1 + 10.0, -1.0]);
            labels.push(1usize);
        }
        let records = Array2::from_shape_vec((40, 2), rows).unwrap();
        Dataset::new(records, Array1::from_vec(labels))
    }

    #[test]
    fn learns_a_separable_dataset() {
        let dataset = toy_dataset();
        let forest = ForestModel::fit(&dataset, 10).unwrap();
        assert_eq!(forest.n_trees(), 10);

        let predictions = forest.predict(dataset.records());
        assert_eq!(predictions, *dataset.targets());
        assert!((forest.accuracy(&dataset).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn vote_fraction_is_a_probability() {
        let dataset = toy_dataset();
        let forest = ForestModel::fit(&dataset, 10).unwrap();

        let positive = forest.vote_fraction(dataset.records().row(1));
        let negative = forest.vote_fraction(dataset.records().row(0));
        assert!((0.0..=1.0).contains(&positive));
        assert!((0.0..=1.0).contains(&negative));
        assert!(positive > 0.5);
        assert!(negative < 0.5);
    }

    #[test]
    fn loaded_model_predicts_identically() {
        let dir = TempDir::new("forest").unwrap();
        let dataset = toy_dataset();
        let forest = ForestModel::fit(&dataset, 10).unwrap();

        let path = dir.path().join("liver_model.bin");
        forest.save(&path).unwrap();
        let loaded = ForestModel::load(&path).unwrap();

        assert_eq!(loaded.n_trees(), forest.n_trees());
        assert_eq!(
            loaded.predict(dataset.records()),
            forest.predict(dataset.records())
        );
    }
}
