use crate::api::response::{Envelope, timestamp};
use crate::errors::ApiError;
use crate::fields::{REFERENCE_LAT, REFERENCE_LON};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use shared::timing::Stopwatch;
use std::time::Duration;
use tracing::error;
use upstreams::Language;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const CACHE_PROBE_KEY: &str = "health_check";
const CACHE_PROBE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'static str>,
    timestamp: String,
}

impl ServiceHealth {
    fn probed(healthy: bool, stopwatch: &Stopwatch, live: bool) -> Self {
        ServiceHealth {
            status: if healthy { Status::Healthy } else { Status::Unhealthy },
            response_time: Some(stopwatch.elapsed_ms()),
            message: None,
            mode: Some(mode(live)),
            timestamp: timestamp(),
        }
    }

    fn static_ok(message: &'static str) -> Self {
        ServiceHealth {
            status: Status::Healthy,
            response_time: None,
            message: Some(message),
            mode: None,
            timestamp: timestamp(),
        }
    }
}

fn mode(live: bool) -> &'static str {
    if live { "live" } else { "simulated" }
}

async fn check_ai(state: &AppState) -> ServiceHealth {
    let stopwatch = Stopwatch::start();
    let reply = state.upstreams.ai.chat("health check", Language::English, None).await;
    ServiceHealth::probed(!reply.is_empty(), &stopwatch, state.upstreams.ai.is_live())
}

async fn check_weather(state: &AppState) -> ServiceHealth {
    let stopwatch = Stopwatch::start();
    let snapshot = state.upstreams.weather.current(REFERENCE_LAT, REFERENCE_LON).await;
    ServiceHealth::probed(
        !snapshot.condition.is_empty(),
        &stopwatch,
        state.upstreams.weather.is_live(),
    )
}

fn check_satellite() -> ServiceHealth {
    ServiceHealth::static_ok("Satellite readings are simulated")
}

fn check_sms() -> ServiceHealth {
    ServiceHealth::static_ok("SMS delivery is simulated")
}

/// Writes and reads back a sentinel entry.
fn cache_healthy(state: &AppState) -> bool {
    state.cache.set(CACHE_PROBE_KEY, "ok", Some(CACHE_PROBE_TTL))
        && state.cache.get(CACHE_PROBE_KEY) == Some(json!("ok"))
}

/// Liveness probe.
pub async fn liveness(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": timestamp(),
        "uptime": state.uptime_secs(),
        "environment": state.config.environment.as_str(),
    }))
}

pub async fn system(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (ai, weather) = tokio::join!(check_ai(&state), check_weather(&state));
    let cache = if cache_healthy(&state) {
        Status::Healthy
    } else {
        error!("cache health check failed");
        Status::Unhealthy
    };

    let services = [Status::Healthy, cache, ai.status, weather.status];
    let all_healthy = services.iter().all(|status| *status == Status::Healthy);
    let (code, overall) = if all_healthy {
        (StatusCode::OK, Status::Healthy)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Status::Degraded)
    };

    let body = json!({
        "success": true,
        "data": {
            "status": overall,
            "timestamp": timestamp(),
            "uptime": state.uptime_secs(),
            "environment": state.config.environment.as_str(),
            "version": VERSION,
            "services": {
                "api": Status::Healthy,
                "cache": cache,
                "ai": ai.status,
                "weather": weather.status,
            },
        },
    });
    (code, Json(body))
}

pub async fn detailed(State(state): State<AppState>) -> Envelope<Value> {
    let (ai, weather) = tokio::join!(check_ai(&state), check_weather(&state));
    Envelope::ok(json!({
        "system": {
            "uptime": state.uptime_secs(),
            "version": VERSION,
        },
        "cache": state.cache.stats(),
        "services": {
            "ai": ai,
            "weather": weather,
            "satellite": check_satellite(),
            "sms": check_sms(),
            "market": { "mode": mode(state.upstreams.market.is_live()) },
        },
        "environment": {
            "nodeEnv": state.config.environment.as_str(),
            "port": state.config.listener.port,
            "corsOrigin": state.config.cors_origin(),
        },
    }))
}

pub async fn ai(State(state): State<AppState>) -> Envelope<ServiceHealth> {
    Envelope::ok(check_ai(&state).await)
}

pub async fn weather(State(state): State<AppState>) -> Envelope<ServiceHealth> {
    Envelope::ok(check_weather(&state).await)
}

pub async fn satellite() -> Envelope<ServiceHealth> {
    Envelope::ok(check_satellite())
}

pub async fn sms() -> Envelope<ServiceHealth> {
    Envelope::ok(check_sms())
}

pub async fn database(State(state): State<AppState>) -> Envelope<Value> {
    Envelope::ok(json!({
        "status": Status::Healthy,
        "backend": state.store.backend(),
        "collections": {
            "agmarknetRecords": state.store.market_records.len(),
            "aiRecommendations": state.store.recommendations.len(),
        },
    }))
}

pub async fn cache(State(state): State<AppState>) -> Result<Envelope<Value>, ApiError> {
    if !cache_healthy(&state) {
        error!("cache health check failed");
        return Err(ApiError::Unavailable {
            message: "Cache service unavailable",
        });
    }
    Ok(Envelope::ok(json!({
        "status": Status::Healthy,
        "stats": state.cache.stats(),
    })))
}
