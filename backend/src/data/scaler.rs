use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization (zero mean, unit variance), fitted once at
/// training time and reused unchanged for every inference request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(records: &Array2<f64>) -> Self {
        let n = records.nrows().max(1) as f64;
        let mean: Vec<f64> = records
            .axis_iter(Axis(1))
            .map(|col| col.sum() / n)
            .collect();
        let std: Vec<f64> = records
            .axis_iter(Axis(1))
            .zip(&mean)
            .map(|(col, &m)| {
                let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
                let std = var.sqrt();
                // A constant column scales by 1.0 instead of dividing by zero.
                if std > 0.0 { std } else { 1.0 }
            })
            .collect();
        Self { mean, std }
    }

    pub fn transform(&self, records: &Array2<f64>) -> Array2<f64> {
        let mut out = records.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.std[j];
            }
        }
        out
    }

    pub fn transform_row(&self, row: &[f64]) -> Array1<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| (v - self.mean[j]) / self.std[j])
            .collect()
    }

    pub fn inverse_transform(&self, records: &Array2<f64>) -> Array2<f64> {
        let mut out = records.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = *v * self.std[j] + self.mean[j];
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn transform_then_inverse_is_identity() {
        let records = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let scaler = StandardScaler::fit(&records);
        let round_trip = scaler.inverse_transform(&scaler.transform(&records));
        for (a, b) in records.iter().zip(round_trip.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn transformed_columns_are_standardized() {
        let records = array![[1.0, 5.0], [2.0, 6.0], [3.0, 7.0], [4.0, 8.0]];
        let scaler = StandardScaler::fit(&records);
        let scaled = scaler.transform(&records);
        for j in 0..2 {
            let col = scaled.column(j);
            let mean = col.sum() / col.len() as f64;
            let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-9);
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn constant_column_survives_round_trip() {
        let records = array![[7.0, 1.0], [7.0, 2.0], [7.0, 3.0]];
        let scaler = StandardScaler::fit(&records);
        let scaled = scaler.transform(&records);
        // Zero-variance column maps to all zeros, not NaN.
        assert!(scaled.column(0).iter().all(|v| *v == 0.0));
        let round_trip = scaler.inverse_transform(&scaled);
        assert!(round_trip.column(0).iter().all(|v| (*v - 7.0).abs() < 1e-9));
    }

    #[test]
    fn transform_row_matches_matrix_transform() {
        let records = array![[1.0, 10.0], [3.0, 30.0]];
        let scaler = StandardScaler::fit(&records);
        let scaled = scaler.transform(&records);
        let row = scaler.transform_row(&[1.0, 10.0]);
        assert!((row[0] - scaled[[0, 0]]).abs() < 1e-9);
        assert!((row[1] - scaled[[0, 1]]).abs() < 1e-9);
    }
}
