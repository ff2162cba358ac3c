//! Offline training entry point. Prepares every dataset found under the
//! data directory, fits one model per disease, and persists the fitted
//! artifacts for the server to load. Pass disease names as arguments to
//! train a subset.

use backend::config::AppConfig;
use backend::data::schema::{IMAGE_SCHEMAS, TABULAR_SCHEMAS};
use backend::data::{images, tabular};
use backend::error::PipelineError;
use backend::models::cnn;
use backend::models::forest::{ENSEMBLE_SIZE, ForestModel};
use shared::Disease;
use std::str::FromStr;

fn main() -> Result<(), PipelineError> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let config = AppConfig::from_env();
    std::fs::create_dir_all(&config.artifacts_dir)?;

    let selected: Vec<Disease> = std::env::args()
        .skip(1)
        .map(|arg| {
            Disease::from_str(&arg)
                .map_err(|_| PipelineError::InvalidInput(format!("unknown disease '{arg}'")))
        })
        .collect::<Result<_, _>>()?;
    let wanted = |disease: Disease| selected.is_empty() || selected.contains(&disease);

    for schema in &TABULAR_SCHEMAS {
        if !wanted(schema.disease) {
            continue;
        }
        let csv_path = config.csv_path(schema.disease);
        if !csv_path.exists() {
            log::warn!(
                "dataset not found: {}; skipping {}",
                csv_path.display(),
                schema.disease
            );
            continue;
        }

        log::info!("preparing {} from {}", schema.disease, csv_path.display());
        let prepared = tabular::prepare(schema, &csv_path)?;
        let (train, valid) = prepared.dataset.split_with_ratio(0.8);

        let model = ForestModel::fit(&train, ENSEMBLE_SIZE)?;
        let accuracy = model.accuracy(&valid)?;
        log::info!(
            "{}: {} trees, held-out accuracy {:.3}",
            schema.disease,
            model.n_trees(),
            accuracy
        );

        prepared.preprocessor.save(&config.scaler_path(schema.disease))?;
        model.save(&config.forest_path(schema.disease))?;
        log::info!("{}: artifacts written", schema.disease);
    }

    for schema in &IMAGE_SCHEMAS {
        if !wanted(schema.disease) {
            continue;
        }
        let image_dir = config.image_dir(schema.disease);
        if !image_dir.exists() {
            log::warn!(
                "dataset not found: {}; skipping {}",
                image_dir.display(),
                schema.disease
            );
            continue;
        }

        log::info!("archiving {} from {}", schema.disease, image_dir.display());
        let archive = images::build_archive(&image_dir, schema)?;
        log::info!("{}: {} preprocessed samples", schema.disease, archive.len());
        archive.save(&config.archive_path(schema.disease))?;

        let model = cnn::train(&image_dir, schema, cnn::EPOCHS)?;
        model.save(&config.cnn_path(schema.disease))?;
        log::info!("{}: artifacts written", schema.disease);
    }

    Ok(())
}
