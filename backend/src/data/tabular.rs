use crate::data::scaler::StandardScaler;
use crate::data::schema::TabularSchema;
use crate::error::PipelineError;
use linfa::prelude::*;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use shared::{FeatureValue, PredictionRequest};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Category -> integer code mapping, fitted on the training data. Codes
/// are assigned in sorted category order so they are stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let classes: std::collections::BTreeSet<String> =
            values.map(|v| v.to_string()).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Everything needed to turn a raw feature map into the vector the
/// classifier was trained on: the ordered feature names, the fitted
/// category encoders, the training-set column means used for imputation,
/// and the fitted scaler. Persisted as one JSON artifact per disease.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preprocessor {
    pub feature_names: Vec<String>,
    pub encoders: BTreeMap<String, LabelEncoder>,
    pub impute_means: Vec<f64>,
    pub scaler: StandardScaler,
}

impl Preprocessor {
    /// Re-applies the fitted encoding and scaling to one request. The
    /// request must supply exactly the feature set the model was fitted
    /// on; anything else is rejected.
    pub fn transform_request(&self, request: &PredictionRequest) -> Result<Array1<f64>, PipelineError> {
        if request.features.len() != self.feature_names.len() {
            return Err(PipelineError::FeatureMismatch(format!(
                "expected {} fields, got {}",
                self.feature_names.len(),
                request.features.len()
            )));
        }

        let mut row = Vec::with_capacity(self.feature_names.len());
        for name in &self.feature_names {
            let value = request.features.get(name).ok_or_else(|| {
                PipelineError::FeatureMismatch(format!("missing field '{name}'"))
            })?;
            row.push(self.encode_value(name, value)?);
        }
        Ok(self.scaler.transform_row(&row))
    }

    fn encode_value(&self, name: &str, value: &FeatureValue) -> Result<f64, PipelineError> {
        if let Some(encoder) = self.encoders.get(name) {
            match value {
                FeatureValue::Text(s) => {
                    encoder
                        .transform(s.trim())
                        .map(|code| code as f64)
                        .ok_or_else(|| PipelineError::UnknownCategory {
                            field: name.to_string(),
                            value: s.clone(),
                        })
                }
                FeatureValue::Number(_) => Err(PipelineError::InvalidInput(format!(
                    "field '{name}' is categorical and takes one of its category values"
                ))),
            }
        } else {
            match value {
                FeatureValue::Number(n) => Ok(*n),
                // HTML form inputs arrive as strings; accept numeric text.
                FeatureValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                    PipelineError::InvalidInput(format!("field '{name}' must be numeric"))
                }),
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// A fully prepared tabular dataset: the fitted preprocessor plus the
/// scaled feature matrix and binary labels as a linfa dataset.
pub struct PreparedDataset {
    pub preprocessor: Preprocessor,
    pub dataset: Dataset<f64, usize>,
}

/// Loads a CSV, encodes categorical columns, imputes missing values with
/// the column mean, standardizes, and pairs the result with its labels.
pub fn prepare(schema: &TabularSchema, csv_path: &Path) -> Result<PreparedDataset, PipelineError> {
    let file = File::open(csv_path)?;
    let df = CsvReader::new(file).finish()?;
    let n_rows = df.height();

    let mut encoders = BTreeMap::new();
    let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(schema.feature_columns.len());
    for &name in schema.feature_columns {
        if schema.is_categorical(name) {
            let raw = column_as_string(&df, name)?;
            let encoder = LabelEncoder::fit(raw.iter().flatten().map(String::as_str));
            let encoded = raw
                .iter()
                .map(|v| {
                    v.as_deref()
                        .and_then(|s| encoder.transform(s).map(|code| code as f64))
                })
                .collect();
            encoders.insert(name.to_string(), encoder);
            columns.push(encoded);
        } else {
            columns.push(column_as_f64(&df, name)?);
        }
    }

    let impute_means: Vec<f64> = columns
        .iter()
        .map(|col| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for v in col.iter().flatten() {
                sum += v;
                count += 1;
            }
            if count == 0 { 0.0 } else { sum / count as f64 }
        })
        .collect();

    let mut flat = Vec::with_capacity(n_rows * columns.len());
    for i in 0..n_rows {
        for (j, col) in columns.iter().enumerate() {
            flat.push(col[i].unwrap_or(impute_means[j]));
        }
    }
    let records = Array2::from_shape_vec((n_rows, columns.len()), flat)?;
    let labels = read_labels(&df, schema)?;

    let scaler = StandardScaler::fit(&records);
    let scaled = scaler.transform(&records);

    let feature_names: Vec<String> = schema
        .feature_columns
        .iter()
        .map(|s| s.to_string())
        .collect();
    let preprocessor = Preprocessor {
        feature_names: feature_names.clone(),
        encoders,
        impute_means,
        scaler,
    };
    let dataset = Dataset::new(scaled, labels).with_feature_names(feature_names);

    Ok(PreparedDataset {
        preprocessor,
        dataset,
    })
}

fn read_labels(df: &DataFrame, schema: &TabularSchema) -> Result<Array1<usize>, PipelineError> {
    let raw = column_as_string(df, schema.label_column)?;
    let labels: Vec<usize> = raw
        .iter()
        .map(|v| match v.as_deref() {
            Some(s) => Ok((s == schema.positive_label) as usize),
            None => Err(PipelineError::InvalidInput(format!(
                "empty label in column '{}'",
                schema.label_column
            ))),
        })
        .collect::<Result<_, _>>()?;
    Ok(Array1::from_vec(labels))
}

/// Numeric view of a column. String columns (as produced by messy CSVs
/// with placeholder tokens) are parsed per cell; unparsable cells become
/// missing values and get imputed downstream.
fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, PipelineError> {
    let series = df
        .column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;
    match series.dtype() {
        DataType::String => {
            let ca = series.str()?;
            Ok(ca
                .into_iter()
                .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
                .collect())
        }
        _ => {
            let cast = series.cast(&DataType::Float64)?;
            let ca = cast.f64()?;
            Ok(ca.into_iter().collect())
        }
    }
}

fn column_as_string(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, PipelineError> {
    let series = df
        .column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;
    let cast = series.cast(&DataType::String)?;
    let ca = cast.str()?;
    Ok(ca
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect())
}
