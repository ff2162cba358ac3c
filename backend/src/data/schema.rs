use shared::Disease;

/// Fixed schema of one tabular dataset: the ordered feature columns, the
/// subset that is categorical, and how the label column is read. Fitted
/// models are bound to exactly this column order.
#[derive(Debug, Clone, Copy)]
pub struct TabularSchema {
    pub disease: Disease,
    pub label_column: &'static str,
    /// Raw label value counted as the positive class.
    pub positive_label: &'static str,
    pub feature_columns: &'static [&'static str],
    pub categorical_columns: &'static [&'static str],
}

/// Fixed layout of one labelled image tree: two class subdirectories,
/// one of which is the positive class.
#[derive(Debug, Clone, Copy)]
pub struct ImageSchema {
    pub disease: Disease,
    pub positive_class: &'static str,
    pub negative_class: &'static str,
}

pub static TABULAR_SCHEMAS: [TabularSchema; 4] = [
    TabularSchema {
        disease: Disease::Diabetes,
        label_column: "Outcome",
        positive_label: "1",
        feature_columns: &[
            "Pregnancies",
            "Glucose",
            "BloodPressure",
            "SkinThickness",
            "Insulin",
            "BMI",
            "DiabetesPedigreeFunction",
            "Age",
        ],
        categorical_columns: &[],
    },
    TabularSchema {
        disease: Disease::Heart,
        label_column: "target",
        positive_label: "1",
        feature_columns: &[
            "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang",
            "oldpeak", "slope", "ca", "thal",
        ],
        categorical_columns: &[],
    },
    TabularSchema {
        disease: Disease::Kidney,
        label_column: "classification",
        positive_label: "ckd",
        feature_columns: &[
            "age", "bp", "sg", "al", "su", "rbc", "pc", "pcc", "ba", "bgr", "bu", "sc", "sod",
            "pot", "hemo", "pcv", "wc", "rc", "htn", "dm", "cad", "appet", "pe", "ane",
        ],
        categorical_columns: &["rbc", "pc", "pcc", "ba", "htn", "dm", "cad", "appet", "pe", "ane"],
    },
    TabularSchema {
        disease: Disease::Liver,
        label_column: "Dataset",
        positive_label: "1",
        feature_columns: &[
            "Age",
            "Gender",
            "Total_Bilirubin",
            "Direct_Bilirubin",
            "Alkaline_Phosphotase",
            "Alamine_Aminotransferase",
            "Aspartate_Aminotransferase",
            "Total_Protiens",
            "Albumin",
            "Albumin_and_Globulin_Ratio",
        ],
        categorical_columns: &["Gender"],
    },
];

pub static IMAGE_SCHEMAS: [ImageSchema; 2] = [
    ImageSchema {
        disease: Disease::Malaria,
        positive_class: "Parasitized",
        negative_class: "Uninfected",
    },
    ImageSchema {
        disease: Disease::Pneumonia,
        positive_class: "PNEUMONIA",
        negative_class: "NORMAL",
    },
];

pub fn tabular_schema(disease: Disease) -> Option<&'static TabularSchema> {
    TABULAR_SCHEMAS.iter().find(|s| s.disease == disease)
}

pub fn image_schema(disease: Disease) -> Option<&'static ImageSchema> {
    IMAGE_SCHEMAS.iter().find(|s| s.disease == disease)
}

impl TabularSchema {
    pub fn is_categorical(&self, column: &str) -> bool {
        self.categorical_columns.contains(&column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::DiseaseKind;

    #[test]
    fn every_disease_has_exactly_one_schema() {
        use strum::IntoEnumIterator;
        for disease in Disease::iter() {
            match disease.kind() {
                DiseaseKind::Tabular => {
                    assert!(tabular_schema(disease).is_some(), "{disease} missing");
                    assert!(image_schema(disease).is_none());
                }
                DiseaseKind::Image => {
                    assert!(image_schema(disease).is_some(), "{disease} missing");
                    assert!(tabular_schema(disease).is_none());
                }
            }
        }
    }

    #[test]
    fn categorical_columns_are_feature_columns() {
        for schema in &TABULAR_SCHEMAS {
            for column in schema.categorical_columns {
                assert!(
                    schema.feature_columns.contains(column),
                    "{} not a feature of {}",
                    column,
                    schema.disease
                );
            }
        }
    }
}
