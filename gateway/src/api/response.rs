//! The `{success, data, cached?, responseTime?}` envelope of the data endpoints.

use axum::Json;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use response_cache::ResponseCache;
use serde::Serialize;
use shared::timing::Stopwatch;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    /// Milliseconds spent producing `data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope {
            success: true,
            data,
            cached: None,
            response_time: None,
        }
    }

    pub fn timed(data: T, stopwatch: &Stopwatch) -> Self {
        Envelope {
            response_time: Some(stopwatch.elapsed_ms()),
            ..Self::ok(data)
        }
    }

    fn from_cache(data: T) -> Self {
        Envelope {
            cached: Some(true),
            ..Self::ok(data)
        }
    }

    fn fetched(data: T, stopwatch: &Stopwatch) -> Self {
        Envelope {
            cached: Some(false),
            ..Self::timed(data, stopwatch)
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Serves `key` from the cache, or runs `fetch` once and caches its result
/// for `ttl`.
pub async fn cached_or_fetch<T, F, Fut>(
    cache: &ResponseCache,
    key: &str,
    ttl: Duration,
    fetch: F,
) -> Response
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if let Some(cached) = cache.get(key) {
        return Envelope::from_cache(cached).into_response();
    }

    let stopwatch = Stopwatch::start();
    let data = fetch().await;
    cache.set(key, &data, Some(ttl));
    Envelope::fetched(data, &stopwatch).into_response()
}

pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
