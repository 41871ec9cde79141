use crate::api::response::{Envelope, cached_or_fetch, timestamp};
use crate::errors::ApiError;
use crate::state::AppState;
use crate::validation::{ValidJson, Validate, ValidationErrors};
use axum::Json;
use axum::extract::State;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use response_cache::AI_TTL;
use response_cache::keys::ai_key;
use serde::Deserialize;
use serde_json::{Value, json};
use shared::timing::Stopwatch;
use upstreams::Language;
use upstreams::ai::CropQuery;

const LANGUAGES: [&str; 5] = ["english", "hindi", "marathi", "gujarati", "punjabi"];

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    message: Option<String>,
    language: Option<String>,
    context: Option<Value>,
}

impl Validate for ChatRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("message", self.message.as_deref());
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            errors.length("message", message, 1, 1000);
        }
        if let Some(language) = &self.language {
            errors.one_of("language", language, &LANGUAGES);
        }
        if self.context.as_ref().is_some_and(|context| !context.is_object()) {
            errors.push("context", "\"context\" must be of type object");
        }
        errors.into_result()
    }
}

pub async fn chat(State(state): State<AppState>, ValidJson(request): ValidJson<ChatRequest>) -> Response {
    let message = request.message.unwrap_or_default();
    let language = request
        .language
        .as_deref()
        .and_then(Language::from_name)
        .unwrap_or_default();
    let key = ai_key("chat", [("language", language.as_str()), ("message", message.as_str())]);

    cached_or_fetch(&state.cache, &key, AI_TTL, || {
        state.upstreams.ai.chat(&message, language, request.context.as_ref())
    })
    .await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropRequest {
    soil_type: Option<String>,
    climate: Option<String>,
    season: Option<String>,
    farm_size: Option<f64>,
    location: Option<String>,
}

impl Validate for CropRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("soilType", self.soil_type.as_deref());
        errors.required("climate", self.climate.as_deref());
        errors.required("season", self.season.as_deref());
        match self.farm_size {
            None => errors.push("farmSize", "\"farmSize\" is required"),
            Some(size) if !(size.is_finite() && size > 0.0) => {
                errors.push("farmSize", "\"farmSize\" must be a positive number")
            }
            Some(_) => {}
        }
        errors.required("location", self.location.as_deref());
        errors.into_result()
    }
}

impl CropRequest {
    fn into_query(self) -> CropQuery {
        CropQuery {
            soil_type: self.soil_type.unwrap_or_default(),
            climate: self.climate.unwrap_or_default(),
            season: self.season.unwrap_or_default(),
            farm_size: self.farm_size.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
        }
    }
}

pub async fn crop_recommendations(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CropRequest>,
) -> Response {
    let query = request.into_query();
    let key = ai_key(
        "crops",
        [
            ("soilType", query.soil_type.clone()),
            ("climate", query.climate.clone()),
            ("season", query.season.clone()),
            ("farmSize", query.farm_size.to_string()),
            ("location", query.location.clone()),
        ],
    );

    cached_or_fetch(&state.cache, &key, AI_TTL, || {
        state.upstreams.ai.crop_recommendations(&query)
    })
    .await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRequest {
    image_base64: Option<String>,
    crop_type: Option<String>,
}

impl Validate for DiagnosisRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("imageBase64", self.image_base64.as_deref());
        errors.required("cropType", self.crop_type.as_deref());
        errors.into_result()
    }
}

/// Accepts bare base64 as well as `data:image/...;base64,` URLs.
fn image_payload(image: &str) -> &str {
    match image.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => image,
    }
}

pub async fn diagnose_disease(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<DiagnosisRequest>,
) -> Result<Envelope<String>, ApiError> {
    let stopwatch = Stopwatch::start();
    let image = image_payload(request.image_base64.as_deref().unwrap_or_default());
    let crop_type = request.crop_type.as_deref().unwrap_or_default();

    let decoded = STANDARD
        .decode(image)
        .map_err(|_| ApiError::bad_request("Image must be base64 encoded."))?;
    let limit = state.config.upload.max_file_size;
    if decoded.len() > limit {
        return Err(ApiError::bad_request(format!(
            "Image size too large. Maximum size is {}MB.",
            limit / (1024 * 1024)
        )));
    }

    let diagnosis = state.upstreams.ai.diagnose_disease(image, crop_type).await;
    Ok(Envelope::timed(diagnosis, &stopwatch))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let reply = state
        .upstreams
        .ai
        .chat("Hello, this is a health check.", Language::English, None)
        .await;

    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": timestamp(),
        "aiService": if reply.is_empty() { "disconnected" } else { "connected" },
        "mode": if state.upstreams.ai.is_live() { "live" } else { "simulated" },
    }))
}
