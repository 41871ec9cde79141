use crate::api::response::{Envelope, cached_or_fetch, timestamp};
use crate::api::weather::LocationQuery;
use crate::state::AppState;
use crate::validation::{ValidQuery, Validate, ValidationErrors};
use axum::Json;
use axum::extract::State;
use axum::response::Response;
use response_cache::SATELLITE_TTL;
use response_cache::keys::satellite_key;
use serde::Deserialize;
use serde_json::{Value, json};
use shared::timing::Stopwatch;
use upstreams::satellite::FieldBoundary;

pub async fn data(State(state): State<AppState>, ValidQuery(query): ValidQuery<LocationQuery>) -> Response {
    let (lat, lon) = query.coordinates();
    let satellite = state.upstreams.satellite;
    cached_or_fetch(&state.cache, &satellite_key(lat, lon), SATELLITE_TTL, || async move {
        satellite.data(lat, lon)
    })
    .await
}

/// Boundaries have no sensible default location, so both coordinates are required.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct BoundaryQuery(LocationQuery);

impl Validate for BoundaryQuery {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.0.lat.is_none() {
            errors.push("lat", "\"lat\" is required");
        }
        if self.0.lon.is_none() {
            errors.push("lon", "\"lon\" is required");
        }
        self.0.check_ranges(&mut errors);
        errors.into_result()
    }
}

pub async fn field_boundaries(
    State(state): State<AppState>,
    ValidQuery(BoundaryQuery(query)): ValidQuery<BoundaryQuery>,
) -> Envelope<Vec<FieldBoundary>> {
    let stopwatch = Stopwatch::start();
    let (lat, lon) = query.coordinates();
    Envelope::timed(state.upstreams.satellite.field_boundaries(lat, lon), &stopwatch)
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": timestamp(),
        "message": "Satellite service operational",
    }))
}
