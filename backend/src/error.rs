use thiserror::Error;

/// Errors surfaced by the preparation, training and serving pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataframe error: {0}")]
    DataFrame(#[from] polars::prelude::PolarsError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("torch error: {0}")]
    Torch(#[from] tch::TchError),
    #[error("training error: {0}")]
    Training(#[from] linfa::error::Error),
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("artifact encoding error: {0}")]
    Artifact(#[from] bincode::Error),
    #[error("column '{0}' not found in dataset")]
    MissingColumn(String),
    #[error("unknown category '{value}' for field '{field}'")]
    UnknownCategory { field: String, value: String },
    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),
    #[error("no model loaded for disease '{0}'")]
    ModelUnavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
