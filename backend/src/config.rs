use shared::Disease;
use std::env;
use std::path::PathBuf;

/// Runtime configuration, read from the environment (with `.env` support
/// via dotenv in the binaries). Every artifact lives at a fixed path per
/// disease under `artifacts_dir`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let artifacts_dir = env::var("ARTIFACTS_DIR").unwrap_or_else(|_| "artifacts".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8081);

        Self {
            data_dir: PathBuf::from(data_dir),
            artifacts_dir: PathBuf::from(artifacts_dir),
            port,
        }
    }

    /// CSV file of a tabular disease.
    pub fn csv_path(&self, disease: Disease) -> PathBuf {
        self.data_dir.join(format!("{}.csv", disease))
    }

    /// Root of the labelled image tree of an image disease.
    pub fn image_dir(&self, disease: Disease) -> PathBuf {
        self.data_dir.join(disease.to_string())
    }

    /// Fitted preprocessor (encoders, impute means, scaler).
    pub fn scaler_path(&self, disease: Disease) -> PathBuf {
        self.artifacts_dir.join(format!("{}_scaler.json", disease))
    }

    /// Fitted tree ensemble.
    pub fn forest_path(&self, disease: Disease) -> PathBuf {
        self.artifacts_dir.join(format!("{}_model.bin", disease))
    }

    /// Preprocessed image/label array dump.
    pub fn archive_path(&self, disease: Disease) -> PathBuf {
        self.artifacts_dir.join(format!("{}_images.bin", disease))
    }

    /// Trained CNN weights.
    pub fn cnn_path(&self, disease: Disease) -> PathBuf {
        self.artifacts_dir.join(format!("{}_cnn.ot", disease))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_are_per_disease() {
        let config = AppConfig {
            data_dir: PathBuf::from("data"),
            artifacts_dir: PathBuf::from("artifacts"),
            port: 8081,
        };
        assert_eq!(
            config.scaler_path(Disease::Diabetes),
            PathBuf::from("artifacts/diabetes_scaler.json")
        );
        assert_eq!(
            config.cnn_path(Disease::Malaria),
            PathBuf::from("artifacts/malaria_cnn.ot")
        );
        assert_eq!(config.csv_path(Disease::Heart), PathBuf::from("data/heart.csv"));
        assert_eq!(config.image_dir(Disease::Pneumonia), PathBuf::from("data/pneumonia"));
    }
}
