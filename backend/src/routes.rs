use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::error;
use serde::Serialize;
use shared::{Disease, PredictionRequest};
use std::io::Write;
use std::str::FromStr;

use crate::error::PipelineError;
use crate::registry::ModelRegistry;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, frontend_dir: String) {
    cfg.service(web::resource("/api/diseases").route(web::get().to(list_diseases)))
        .service(web::resource("/api/predict/{disease}").route(web::post().to(handle_predict)))
        .service(web::resource("/api/inference/{disease}").route(web::post().to(handle_inference)))
        .service(Files::new("/static", frontend_dir).index_file("index.html"));
}

async fn list_diseases(registry: web::Data<ModelRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(registry.descriptors())
}

fn parse_disease(raw: &str) -> Result<Disease, HttpResponse> {
    Disease::from_str(raw).map_err(|_| {
        HttpResponse::NotFound().json(ErrorResponse {
            error: format!("unknown disease '{raw}'"),
        })
    })
}

async fn handle_predict(
    registry: web::Data<ModelRegistry>,
    path: web::Path<String>,
    request: web::Json<PredictionRequest>,
) -> HttpResponse {
    let disease = match parse_disease(&path.into_inner()) {
        Ok(disease) => disease,
        Err(resp) => return resp,
    };
    match registry.predict_tabular(disease, &request) {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(e),
    }
}

async fn handle_inference(
    registry: web::Data<ModelRegistry>,
    path: web::Path<String>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let disease = match parse_disease(&path.into_inner()) {
        Ok(disease) => disease,
        Err(resp) => return Ok(resp),
    };

    let mut image_data = Vec::new();
    while let Ok(Some(mut field)) = payload.try_next().await {
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            image_data.write_all(&data)?;
        }
        if !image_data.is_empty() {
            break;
        }
    }
    if image_data.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "no image uploaded".to_string(),
        }));
    }

    Ok(match registry.predict_image(disease, &image_data) {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(e),
    })
}

fn error_response(e: PipelineError) -> HttpResponse {
    match &e {
        PipelineError::ModelUnavailable(_) => HttpResponse::NotFound().json(ErrorResponse {
            error: e.to_string(),
        }),
        PipelineError::FeatureMismatch(_)
        | PipelineError::UnknownCategory { .. }
        | PipelineError::InvalidInput(_)
        | PipelineError::Image(_) => HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
        }),
        _ => {
            error!("prediction failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::TabularSchema;
    use crate::data::tabular;
    use crate::models::forest::ForestModel;
    use crate::registry::TabularPredictor;
    use actix_web::{App, test};
    use shared::FeatureValue;
    use std::collections::HashMap;
    use tempdir::TempDir;

    static TOY_SCHEMA: TabularSchema = TabularSchema {
        disease: Disease::Liver,
        label_column: "Dataset",
        positive_label: "1",
        feature_columns: &["Age", "Gender"],
        categorical_columns: &["Gender"],
    };

    fn empty_registry() -> ModelRegistry {
        ModelRegistry {
            tabular: HashMap::new(),
            image: HashMap::new(),
        }
    }

    fn toy_registry() -> ModelRegistry {
        let dir = TempDir::new("routes").unwrap();
        let path = dir.path().join("liver.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        // Old patients positive, young negative; trivially separable.
        let mut rows = String::from("Age,Gender,Dataset\n");
        for age in 0..20 {
            rows.push_str(&format!("{},Male,2\n", 20 + age));
            rows.push_str(&format!("{},Female,1\n", 60 + age));
        }
        file.write_all(rows.as_bytes()).unwrap();

        let prepared = tabular::prepare(&TOY_SCHEMA, &path).unwrap();
        let forest = ForestModel::fit(&prepared.dataset, 10).unwrap();

        let mut registry = empty_registry();
        registry.tabular.insert(
            Disease::Liver,
            TabularPredictor {
                schema: &TOY_SCHEMA,
                preprocessor: prepared.preprocessor,
                forest,
            },
        );
        registry
    }

    fn features(age: f64, gender: &str) -> PredictionRequest {
        let mut features = HashMap::new();
        features.insert("Age".to_string(), FeatureValue::Number(age));
        features.insert("Gender".to_string(), FeatureValue::Text(gender.to_string()));
        PredictionRequest { features }
    }

    #[actix_web::test]
    async fn diseases_lists_only_loaded_models() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(toy_registry()))
                .service(web::resource("/api/diseases").route(web::get().to(list_diseases))),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/diseases").to_request();
        let body: Vec<shared::DiseaseDescriptor> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].disease, Disease::Liver);
        assert_eq!(body[0].fields.len(), 2);
        assert_eq!(
            body[0].fields[1].categories.as_deref(),
            Some(&["Female".to_string(), "Male".to_string()][..])
        );
    }

    #[actix_web::test]
    async fn predict_round_trips_through_the_handler() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(toy_registry()))
                .service(
                    web::resource("/api/predict/{disease}").route(web::post().to(handle_predict)),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/predict/liver")
            .set_json(features(70.0, "Female"))
            .to_request();
        let body: shared::PredictionResponse = test::call_and_read_body_json(&app, req).await;
        assert!(body.positive);
        assert_eq!(body.label, "Positive");

        let req = test::TestRequest::post()
            .uri("/api/predict/liver")
            .set_json(features(25.0, "Male"))
            .to_request();
        let body: shared::PredictionResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!body.positive);
    }

    #[actix_web::test]
    async fn bad_feature_sets_are_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(toy_registry()))
                .service(
                    web::resource("/api/predict/{disease}").route(web::post().to(handle_predict)),
                ),
        )
        .await;

        let mut only_age = HashMap::new();
        only_age.insert("Age".to_string(), FeatureValue::Number(70.0));
        let req = test::TestRequest::post()
            .uri("/api/predict/liver")
            .set_json(PredictionRequest { features: only_age })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let req = test::TestRequest::post()
            .uri("/api/predict/liver")
            .set_json(features(70.0, "Unknown"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn unknown_or_unloaded_diseases_are_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(empty_registry()))
                .service(
                    web::resource("/api/predict/{disease}").route(web::post().to(handle_predict)),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/predict/gout")
            .set_json(features(70.0, "Female"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);

        let req = test::TestRequest::post()
            .uri("/api/predict/liver")
            .set_json(features(70.0, "Female"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }
}
