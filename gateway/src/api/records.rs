//! Saved market price records and AI recommendation rows.
//!
//! These endpoints answer with the documents themselves and report errors
//! as `{message}`, unlike the enveloped data endpoints.

use crate::errors::ApiError;
use crate::state::AppState;
use crate::store::{AiRecommendation, AiRecommendationFields, MarketRecord, MarketRecordFields, StoreError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info};

const NOT_FOUND: &str = "AGMARKNET record not found";

/// JSON body whose parse errors are reported as `{message}`.
pub struct DocumentJson<T>(pub T);

impl<S, T> FromRequest<S> for DocumentJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection: JsonRejection| {
                ApiError::document(StatusCode::BAD_REQUEST, rejection.body_text())
            })?;
        Ok(DocumentJson(value))
    }
}

fn server_error(state: &AppState, message: &str, err: StoreError) -> ApiError {
    error!(error = %err, "{}", message);
    ApiError::Document {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.to_string(),
        detail: state.detail(&err),
    }
}

fn not_found() -> ApiError {
    ApiError::document(StatusCode::NOT_FOUND, NOT_FOUND)
}

pub async fn create_record(
    State(state): State<AppState>,
    DocumentJson(fields): DocumentJson<MarketRecordFields>,
) -> Result<(StatusCode, Json<MarketRecord>), ApiError> {
    let record = fields.create().ok_or_else(|| {
        ApiError::document(
            StatusCode::BAD_REQUEST,
            "Commodity, market, state, district, and arrival_date are required fields.",
        )
    })?;

    let record = state
        .store
        .market_records
        .insert(record)
        .map_err(|err| server_error(&state, "Server error creating record", err))?;
    info!(id = %record.id, commodity = %record.commodity, "market record created");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_records(State(state): State<AppState>) -> Json<Vec<MarketRecord>> {
    Json(state.store.market_records.list())
}

pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MarketRecord>, ApiError> {
    state.store.market_records.get(&id).map(Json).ok_or_else(not_found)
}

pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    DocumentJson(fields): DocumentJson<MarketRecordFields>,
) -> Result<Json<MarketRecord>, ApiError> {
    if fields.clears_required() {
        return Err(ApiError::document(
            StatusCode::BAD_REQUEST,
            "Commodity, market, state, district, and arrival_date cannot be empty.",
        ));
    }

    state
        .store
        .market_records
        .update(&id, |record| fields.apply(record))
        .map_err(|err| server_error(&state, "Server error updating record", err))?
        .map(Json)
        .ok_or_else(not_found)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    message: &'static str,
    deleted_record: MarketRecord,
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let deleted_record = state
        .store
        .market_records
        .remove(&id)
        .map_err(|err| server_error(&state, "Server error deleting record", err))?
        .ok_or_else(not_found)?;

    info!(%id, "market record deleted");
    Ok(Json(Deleted {
        message: "AGMARKNET record deleted successfully",
        deleted_record,
    }))
}

pub async fn create_recommendation(
    State(state): State<AppState>,
    DocumentJson(fields): DocumentJson<AiRecommendationFields>,
) -> Result<(StatusCode, Json<AiRecommendation>), ApiError> {
    let recommendation = fields.create().ok_or_else(|| {
        ApiError::document(
            StatusCode::BAD_REQUEST,
            "Crop name and suitability score are required.",
        )
    })?;

    let recommendation = state
        .store
        .recommendations
        .insert(recommendation)
        .map_err(|err| server_error(&state, "Server error saving AI recommendation", err))?;
    info!(id = %recommendation.id, crop = %recommendation.crop_name, "AI recommendation saved");
    Ok((StatusCode::CREATED, Json(recommendation)))
}

pub async fn list_recommendations(State(state): State<AppState>) -> Json<Vec<AiRecommendation>> {
    Json(state.store.recommendations.list())
}
