use crate::api::response::{cached_or_fetch, timestamp};
use crate::fields::{REFERENCE_LAT, REFERENCE_LON};
use crate::state::AppState;
use crate::validation::{ValidQuery, Validate, ValidationErrors};
use axum::Json;
use axum::extract::State;
use axum::response::Response;
use response_cache::WEATHER_TTL;
use response_cache::keys::{alerts_key, forecast_key, weather_key};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

const ALERTS_TTL: Duration = Duration::from_secs(15 * 60);

/// `?lat&lon`, defaulting to the reference coordinate.
#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl LocationQuery {
    pub fn coordinates(&self) -> (f64, f64) {
        (
            self.lat.unwrap_or(REFERENCE_LAT),
            self.lon.unwrap_or(REFERENCE_LON),
        )
    }

    pub(crate) fn check_ranges(&self, errors: &mut ValidationErrors) {
        if let Some(lat) = self.lat {
            errors.range("lat", lat, -90.0, 90.0);
        }
        if let Some(lon) = self.lon {
            errors.range("lon", lon, -180.0, 180.0);
        }
    }
}

impl Validate for LocationQuery {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        self.check_ranges(&mut errors);
        errors.into_result()
    }
}

pub async fn current(State(state): State<AppState>, ValidQuery(query): ValidQuery<LocationQuery>) -> Response {
    let (lat, lon) = query.coordinates();
    cached_or_fetch(&state.cache, &weather_key(lat, lon), WEATHER_TTL, || {
        state.upstreams.weather.current(lat, lon)
    })
    .await
}

pub async fn forecast(State(state): State<AppState>, ValidQuery(query): ValidQuery<LocationQuery>) -> Response {
    let (lat, lon) = query.coordinates();
    cached_or_fetch(&state.cache, &forecast_key(lat, lon), WEATHER_TTL, || {
        state.upstreams.weather.forecast(lat, lon)
    })
    .await
}

pub async fn alerts(State(state): State<AppState>, ValidQuery(query): ValidQuery<LocationQuery>) -> Response {
    let (lat, lon) = query.coordinates();
    cached_or_fetch(&state.cache, &alerts_key(lat, lon), ALERTS_TTL, || {
        state.upstreams.weather.alerts(lat, lon)
    })
    .await
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.upstreams.weather.current(REFERENCE_LAT, REFERENCE_LON).await;
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": timestamp(),
        "weatherService": if snapshot.condition.is_empty() { "disconnected" } else { "connected" },
        "mode": if state.upstreams.weather.is_live() { "live" } else { "simulated" },
    }))
}
