use crate::config::AppConfig;
use crate::data::images;
use crate::data::schema::{IMAGE_SCHEMAS, TABULAR_SCHEMAS, TabularSchema};
use crate::data::tabular::Preprocessor;
use crate::error::PipelineError;
use crate::models::cnn::CnnModel;
use crate::models::forest::ForestModel;
use shared::{Disease, DiseaseDescriptor, FieldDescriptor, PredictionRequest, PredictionResponse};
use std::collections::HashMap;
use std::sync::Mutex;
use strum::IntoEnumIterator;

/// Fitted preprocessor + ensemble for one tabular disease.
pub struct TabularPredictor {
    pub(crate) schema: &'static TabularSchema,
    pub(crate) preprocessor: Preprocessor,
    pub(crate) forest: ForestModel,
}

impl TabularPredictor {
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, PipelineError> {
        let row = self.preprocessor.transform_request(request)?;
        let probability = self.forest.vote_fraction(row.view());
        Ok(PredictionResponse::from_probability(
            self.schema.disease,
            probability as f32,
        ))
    }

    fn descriptor(&self) -> DiseaseDescriptor {
        let fields = self
            .preprocessor
            .feature_names
            .iter()
            .map(|name| FieldDescriptor {
                name: name.clone(),
                categories: self
                    .preprocessor
                    .encoders
                    .get(name)
                    .map(|encoder| encoder.classes().to_vec()),
            })
            .collect();
        DiseaseDescriptor {
            disease: self.schema.disease,
            display_name: self.schema.disease.display_name().to_string(),
            kind: self.schema.disease.kind(),
            fields,
        }
    }
}

/// Trained CNN for one image disease. The var store is not shareable
/// across threads, so the loaded model sits behind a mutex.
pub struct ImagePredictor {
    pub(crate) disease: Disease,
    pub(crate) model: Mutex<CnnModel>,
}

impl ImagePredictor {
    pub fn predict(&self, bytes: &[u8]) -> Result<PredictionResponse, PipelineError> {
        let img = images::load_rgb(bytes)?;
        let probability = self.model.lock().unwrap().predict(&img);
        Ok(PredictionResponse::from_probability(self.disease, probability))
    }

    fn descriptor(&self) -> DiseaseDescriptor {
        DiseaseDescriptor {
            disease: self.disease,
            display_name: self.disease.display_name().to_string(),
            kind: self.disease.kind(),
            fields: Vec::new(),
        }
    }
}

/// Every model artifact, loaded once at process start and read-only
/// afterwards. Diseases whose artifacts are missing or unreadable are
/// absent from the registry rather than failing startup.
pub struct ModelRegistry {
    pub(crate) tabular: HashMap<Disease, TabularPredictor>,
    pub(crate) image: HashMap<Disease, ImagePredictor>,
}

impl ModelRegistry {
    pub fn load(config: &AppConfig) -> Self {
        let mut tabular = HashMap::new();
        for schema in &TABULAR_SCHEMAS {
            let scaler_path = config.scaler_path(schema.disease);
            let forest_path = config.forest_path(schema.disease);
            if !scaler_path.exists() || !forest_path.exists() {
                log::warn!(
                    "no artifacts for {}; run the train binary to create them",
                    schema.disease
                );
                continue;
            }
            match (
                Preprocessor::load(&scaler_path),
                ForestModel::load(&forest_path),
            ) {
                (Ok(preprocessor), Ok(forest)) => {
                    log::info!("loaded {} model ({} trees)", schema.disease, forest.n_trees());
                    tabular.insert(
                        schema.disease,
                        TabularPredictor {
                            schema,
                            preprocessor,
                            forest,
                        },
                    );
                }
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("failed to load {} artifacts: {}", schema.disease, e);
                }
            }
        }

        let mut image = HashMap::new();
        for schema in &IMAGE_SCHEMAS {
            let path = config.cnn_path(schema.disease);
            if !path.exists() {
                log::warn!(
                    "no artifacts for {}; run the train binary to create them",
                    schema.disease
                );
                continue;
            }
            match CnnModel::load(&path) {
                Ok(model) => {
                    log::info!("loaded {} model", schema.disease);
                    image.insert(
                        schema.disease,
                        ImagePredictor {
                            disease: schema.disease,
                            model: Mutex::new(model),
                        },
                    );
                }
                Err(e) => {
                    log::warn!("failed to load {} artifacts: {}", schema.disease, e);
                }
            }
        }

        Self { tabular, image }
    }

    pub fn is_empty(&self) -> bool {
        self.tabular.is_empty() && self.image.is_empty()
    }

    /// Descriptors for every loaded disease, in declaration order.
    pub fn descriptors(&self) -> Vec<DiseaseDescriptor> {
        Disease::iter()
            .filter_map(|disease| {
                self.tabular
                    .get(&disease)
                    .map(TabularPredictor::descriptor)
                    .or_else(|| self.image.get(&disease).map(ImagePredictor::descriptor))
            })
            .collect()
    }

    pub fn predict_tabular(
        &self,
        disease: Disease,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, PipelineError> {
        let predictor = self
            .tabular
            .get(&disease)
            .ok_or_else(|| PipelineError::ModelUnavailable(disease.to_string()))?;
        predictor.predict(request)
    }

    pub fn predict_image(
        &self,
        disease: Disease,
        bytes: &[u8],
    ) -> Result<PredictionResponse, PipelineError> {
        let predictor = self
            .image
            .get(&disease)
            .ok_or_else(|| PipelineError::ModelUnavailable(disease.to_string()))?;
        predictor.predict(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn missing_artifacts_leave_registry_empty() {
        let dir = TempDir::new("registry").unwrap();
        let config = AppConfig {
            data_dir: dir.path().join("data"),
            artifacts_dir: dir.path().join("artifacts"),
            port: 0,
        };
        let registry = ModelRegistry::load(&config);
        assert!(registry.is_empty());
        assert!(registry.descriptors().is_empty());
        assert!(matches!(
            registry.predict_tabular(Disease::Diabetes, &PredictionRequest {
                features: HashMap::new()
            }),
            Err(PipelineError::ModelUnavailable(_))
        ));
    }
}
