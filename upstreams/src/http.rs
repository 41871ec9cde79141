use crate::errors::UpstreamError;
use crate::metrics_defs::{UPSTREAM_FALLBACK, UPSTREAM_REQUEST_DURATION};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use shared::timing::Stopwatch;
use shared::{counter, histogram};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub(crate) const DATA_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const TEXT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const VISION_TIMEOUT: Duration = Duration::from_secs(60);

/// Identifies one kind of upstream call for logs and metrics.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Call {
    pub service: &'static str,
    pub endpoint: &'static str,
    pub timeout: Duration,
}

/// Joins `path` onto the configured base URL, keeping any base path.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, UpstreamError> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&joined).map_err(|e| UpstreamError::InvalidUrl(format!("{joined}: {e}")))
}

/// Sends a single request and decodes a JSON body of type `T`.
///
/// The timeout covers the whole exchange including reading the body.
/// Non-2xx statuses and bodies that do not match `T` are errors.
pub(crate) async fn send_json<T: DeserializeOwned>(
    call: Call,
    request: RequestBuilder,
) -> Result<T, UpstreamError> {
    let stopwatch = Stopwatch::start();
    let result = exchange(call, request).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.outcome(),
    };
    histogram!(
        UPSTREAM_REQUEST_DURATION,
        "service" => call.service,
        "endpoint" => call.endpoint,
        "outcome" => outcome
    )
    .record(stopwatch.elapsed_secs());
    info!(
        service = call.service,
        endpoint = call.endpoint,
        outcome,
        elapsed_ms = stopwatch.elapsed_ms(),
        "external api call"
    );

    result
}

async fn exchange<T: DeserializeOwned>(call: Call, request: RequestBuilder) -> Result<T, UpstreamError> {
    let response = request
        .header(reqwest::header::ACCEPT, "application/json")
        .timeout(call.timeout)
        .send()
        .await
        .map_err(|e| timeout_or(call, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status {
            service: call.service,
            status,
        });
    }

    let body = response.bytes().await.map_err(|e| timeout_or(call, e))?;
    serde_json::from_slice(&body).map_err(|e| UpstreamError::InvalidResponse {
        service: call.service,
        reason: e.to_string(),
    })
}

fn timeout_or(call: Call, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout(call.service)
    } else {
        UpstreamError::Reqwest(err)
    }
}

/// Records that a live call failed and fallback data is being served.
pub(crate) fn fallback_after(call: Call, err: &UpstreamError) {
    counter!(
        UPSTREAM_FALLBACK,
        "service" => call.service,
        "endpoint" => call.endpoint,
        "reason" => err.outcome()
    )
    .increment(1);
    warn!(
        service = call.service,
        endpoint = call.endpoint,
        error = %err,
        "upstream call failed, serving fallback data"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::spawn_upstream;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        value: u32,
    }

    const CALL: Call = Call {
        service: "test",
        endpoint: "payload",
        timeout: Duration::from_millis(200),
    };

    #[test]
    fn endpoint_keeps_base_path() {
        let base = Url::parse("https://api.tomorrow.io/v4").unwrap();
        assert_eq!(
            endpoint(&base, "weather/realtime").unwrap().as_str(),
            "https://api.tomorrow.io/v4/weather/realtime"
        );

        let base = Url::parse("https://api.data.gov.in/resource/").unwrap();
        assert_eq!(
            endpoint(&base, "abc").unwrap().as_str(),
            "https://api.data.gov.in/resource/abc"
        );
    }

    #[tokio::test]
    async fn decodes_success_and_rejects_failures() {
        let app = Router::new()
            .route("/ok", get(|| async { r#"{"value": 7}"# }))
            .route("/wrong-shape", get(|| async { r#"{"other": 1}"# }))
            .route("/not-json", get(|| async { "<html>" }))
            .route("/down", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "{}") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    r#"{"value": 1}"#
                }),
            );
        let base = spawn_upstream(app).await;
        let client = reqwest::Client::new();
        let fetch = |path: &str| {
            let url = endpoint(&base, path).unwrap();
            send_json::<Payload>(CALL, client.get(url))
        };

        assert_eq!(fetch("ok").await.unwrap().value, 7);
        assert!(matches!(
            fetch("wrong-shape").await,
            Err(UpstreamError::InvalidResponse { .. })
        ));
        assert!(matches!(
            fetch("not-json").await,
            Err(UpstreamError::InvalidResponse { .. })
        ));
        assert!(matches!(
            fetch("down").await,
            Err(UpstreamError::Status { status, .. }) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        assert!(matches!(fetch("slow").await, Err(UpstreamError::Timeout("test"))));
    }
}
