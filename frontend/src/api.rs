use gloo_file::File as GlooFile;
use gloo_net::http::Request;
use serde::de::DeserializeOwned;
use shared::{Disease, DiseaseDescriptor, PredictionRequest, PredictionResponse};

async fn read_response<T: DeserializeOwned>(
    response: gloo_net::http::Response,
) -> Result<T, String> {
    if response.ok() {
        response
            .json::<T>()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(format!("Server error: {} - {}", status, body))
    }
}

pub async fn fetch_diseases() -> Result<Vec<DiseaseDescriptor>, String> {
    let response = Request::get("/api/diseases")
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    read_response(response).await
}

pub async fn predict_tabular(
    disease: Disease,
    request: &PredictionRequest,
) -> Result<PredictionResponse, String> {
    let response = Request::post(&format!("/api/predict/{}", disease))
        .json(request)
        .map_err(|e| format!("Failed to build request: {}", e))?
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    read_response(response).await
}

pub async fn predict_image(disease: Disease, file: &GlooFile) -> Result<PredictionResponse, String> {
    let form_data = web_sys::FormData::new().map_err(|_| "Failed to build form data")?;
    form_data
        .append_with_blob("image", file.as_ref())
        .map_err(|_| "Failed to attach image")?;

    let response = Request::post(&format!("/api/inference/{}", disease))
        .body(form_data)
        .map_err(|e| format!("Failed to build request: {}", e))?
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    read_response(response).await
}
