use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};

/// The six diseases the system predicts. Four are scored from tabular
/// clinical records, two from microscopy/radiography images.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Disease {
    Diabetes,
    Heart,
    Kidney,
    Liver,
    Malaria,
    Pneumonia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiseaseKind {
    Tabular,
    Image,
}

impl Disease {
    pub fn kind(&self) -> DiseaseKind {
        match self {
            Disease::Malaria | Disease::Pneumonia => DiseaseKind::Image,
            _ => DiseaseKind::Tabular,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Disease::Diabetes => "Diabetes",
            Disease::Heart => "Heart Disease",
            Disease::Kidney => "Chronic Kidney Disease",
            Disease::Liver => "Liver Disease",
            Disease::Malaria => "Malaria",
            Disease::Pneumonia => "Pneumonia",
        }
    }
}

/// One form field of a tabular disease. `categories` is `Some` for
/// categorical fields and lists the values the fitted encoder accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub categories: Option<Vec<String>>,
}

/// What the frontend needs to render one disease page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiseaseDescriptor {
    pub disease: Disease,
    pub display_name: String,
    pub kind: DiseaseKind,
    pub fields: Vec<FieldDescriptor>,
}

/// A single form value: numeric for numeric fields, text for categorical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRequest {
    pub features: HashMap<String, FeatureValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub disease: Disease,
    pub probability: f32,
    pub positive: bool,
    pub label: String,
}

impl PredictionResponse {
    /// Applies the 0.5 decision threshold shared by every model.
    pub fn from_probability(disease: Disease, probability: f32) -> Self {
        let positive = probability > 0.5;
        Self {
            disease,
            probability,
            positive,
            label: if positive { "Positive" } else { "Negative" }.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn disease_string_round_trip() {
        for disease in Disease::iter() {
            let s = disease.to_string();
            assert_eq!(Disease::from_str(&s).unwrap(), disease);
        }
    }

    #[test]
    fn threshold_is_exclusive_at_half() {
        assert!(!PredictionResponse::from_probability(Disease::Diabetes, 0.5).positive);
        assert!(PredictionResponse::from_probability(Disease::Diabetes, 0.51).positive);
        assert_eq!(
            PredictionResponse::from_probability(Disease::Malaria, 0.9).label,
            "Positive"
        );
    }

    #[test]
    fn feature_value_accepts_numbers_and_text() {
        let v: FeatureValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(v, FeatureValue::Number(1.5));
        let v: FeatureValue = serde_json::from_str("\"Male\"").unwrap();
        assert_eq!(v, FeatureValue::Text("Male".to_string()));
    }
}
