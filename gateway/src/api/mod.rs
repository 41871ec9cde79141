//! HTTP routes and the middleware stack around them.

pub mod ai;
pub mod fields;
pub mod health;
pub mod market;
pub mod records;
pub mod response;
pub mod satellite;
pub mod sms;
pub mod user;
pub mod weather;

use crate::auth::require_auth;
use crate::rate_limit;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use response::timestamp;
use serde_json::json;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

fn v1_routes(state: &AppState) -> Router<AppState> {
    let ai_limit = middleware::from_fn_with_state(state.limiters.ai.clone(), rate_limit::enforce);
    let sms_limit = middleware::from_fn_with_state(state.limiters.sms.clone(), rate_limit::enforce);
    let authenticated = middleware::from_fn_with_state(state.clone(), require_auth);

    let ai = Router::new()
        .route("/chat", post(ai::chat))
        .route("/crop-recommendations", post(ai::crop_recommendations))
        .route("/diagnose-disease", post(ai::diagnose_disease))
        .route_layer(ai_limit)
        .route("/health", get(ai::health));

    let weather = Router::new()
        .route("/current", get(weather::current))
        .route("/forecast", get(weather::forecast))
        .route("/alerts", get(weather::alerts))
        .route("/health", get(weather::health));

    let satellite = Router::new()
        .route("/data", get(satellite::data))
        .route("/field-boundaries", get(satellite::field_boundaries))
        .route("/health", get(satellite::health));

    let sms = Router::new()
        .route("/send", post(sms::send))
        .route("/subscribe", post(sms::subscribe))
        .route_layer(sms_limit)
        .route("/history", get(sms::history))
        .route("/subscriptions", get(sms::subscriptions))
        .route("/health", get(sms::health));

    let user = Router::new()
        .route("/profile", get(user::profile).put(user::update_profile))
        .route("/logout", post(user::logout))
        .route_layer(authenticated)
        .route("/register", post(user::register))
        .route("/login", post(user::login))
        .route("/refresh-token", post(user::refresh_token))
        .route("/health", get(user::health));

    let health = Router::new()
        .route("/health", get(health::system))
        .route("/health/detailed", get(health::detailed))
        .route("/health/ai", get(health::ai))
        .route("/health/weather", get(health::weather))
        .route("/health/satellite", get(health::satellite))
        .route("/health/sms", get(health::sms))
        .route("/health/database", get(health::database))
        .route("/health/cache", get(health::cache));

    Router::new()
        .nest("/ai", ai)
        .nest("/weather", weather)
        .nest("/satellite", satellite)
        .nest("/sms", sms)
        .nest("/user", user)
        .route("/fields", get(fields::all))
        .route("/fields/{id}", get(fields::one))
        .merge(health)
}

fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/api/agmarknet", get(market::prices))
        .route("/api/agmarknet/states", get(market::states))
        .route("/api/agmarknet/commodities", get(market::commodities))
        .route(
            "/api/agmarknet-records",
            get(records::list_records).post(records::create_record),
        )
        .route(
            "/api/agmarknet-records/{id}",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route(
            "/api/ai-recommendations",
            get(records::list_recommendations).post(records::create_recommendation),
        )
}

fn cors(state: &AppState) -> CorsLayer {
    let configured = state.config.cors_origin();
    let origin = HeaderValue::from_str(configured).unwrap_or_else(|err| {
        warn!(origin = configured, error = %err, "invalid CORS origin, using the default");
        HeaderValue::from_static(crate::config::GatewayConfig::DEFAULT_CORS_ORIGIN)
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

async fn not_found(method: Method, uri: Uri) -> Response {
    warn!(%method, %uri, "404 not found");
    let body = json!({
        "error": { "message": "Endpoint not found", "code": "NOT_FOUND" },
        "timestamp": timestamp(),
        "path": uri.to_string(),
        "method": method.as_str(),
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "request handler panicked");

    let body = json!({ "success": false, "error": "Internal server error" });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

pub fn router(state: AppState) -> Router {
    let general_limit =
        middleware::from_fn_with_state(state.limiters.general.clone(), rate_limit::enforce);

    Router::new()
        .route("/health", get(health::liveness))
        .nest("/api/v1", v1_routes(&state))
        .merge(market_routes())
        .fallback(not_found)
        .layer(general_limit)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.upload.body_limit()))
        .layer(cors(&state))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::rate_limit::AI_MESSAGE;
    use crate::store::Store;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use response_cache::{CacheConfig, ResponseCache};
    use serde_json::Value;
    use tower::ServiceExt;
    use upstreams::Upstreams;

    fn app_with(config: GatewayConfig) -> Router {
        router(AppState::new(
            config,
            ResponseCache::new(&CacheConfig::default()),
            Upstreams::simulated(),
            Store::in_memory(),
        ))
    }

    fn app() -> Router {
        app_with(GatewayConfig::default())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn latitude_bounds_are_inclusive() {
        let app = app();
        let (status, body) = send(&app, get("/api/v1/weather/current?lat=90&lon=0")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["temperature"], 28);

        let (status, body) = send(&app, get("/api/v1/weather/current?lat=91&lon=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"][0]["field"], "lat");

        let (status, body) = send(&app, get("/api/v1/weather/current?lat=north")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "query");
    }

    #[tokio::test]
    async fn repeated_request_is_cached() {
        let app = app();
        let (_, first) = send(&app, get("/api/v1/weather/forecast")).await;
        assert_eq!(first["cached"], false);
        assert_eq!(first["data"].as_array().unwrap().len(), 7);

        let (_, second) = send(&app, get("/api/v1/weather/forecast?lat=18.52041&lon=73.85669")).await;
        assert_eq!(second["cached"], true);
        assert_eq!(second["data"], first["data"]);
    }

    #[tokio::test]
    async fn eleventh_ai_request_is_rate_limited() {
        let app = app();
        let chat = || {
            let mut request = json_request(
                Method::POST,
                "/api/v1/ai/chat",
                json!({"message": "When should I irrigate?"}),
            );
            request
                .headers_mut()
                .insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
            request
        };

        for _ in 0..10 {
            let (status, _) = send(&app, chat()).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = send(&app, chat()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, json!({"error": AI_MESSAGE}));

        // The AI limit does not apply to other routes.
        let (status, _) = send(&app, get("/api/v1/ai/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let request = Request::post("/api/v1/sms/send")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["details"][0]["field"], "body");
    }

    #[tokio::test]
    async fn market_record_lifecycle() {
        let app = app();
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/agmarknet-records", json!({"commodity": "Onion"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("required"));

        let (status, created) = send(
            &app,
            json_request(
                Method::POST,
                "/api/agmarknet-records",
                json!({
                    "commodity": "Onion",
                    "market": "Pune",
                    "state": "Maharashtra",
                    "district": "Pune",
                    "arrival_date": "14/10/2026",
                    "modal_price": 1850,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["_id"].as_str().unwrap().to_string();
        let uri = format!("/api/agmarknet-records/{id}");

        let (status, fetched) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, updated) =
            send(&app, json_request(Method::PUT, &uri, json!({"market": "Lasalgaon"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["market"], "Lasalgaon");
        assert_eq!(updated["commodity"], "Onion");

        let (_, list) = send(&app, get("/api/agmarknet-records")).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let delete = Request::delete(&uri).body(Body::empty()).unwrap();
        let (status, deleted) = send(&app, delete).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["message"], "AGMARKNET record deleted successfully");
        assert_eq!(deleted["deletedRecord"]["_id"], id.as_str());

        let (status, missing) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(missing, json!({"message": "AGMARKNET record not found"}));
    }

    #[tokio::test]
    async fn recommendations_are_saved() {
        let app = app();
        let (status, _) = send(
            &app,
            json_request(Method::POST, "/api/ai-recommendations", json!({"cropName": "Wheat"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, saved) = send(
            &app,
            json_request(
                Method::POST,
                "/api/ai-recommendations",
                json!({"cropName": "Wheat", "suitabilityScore": 0.92, "season": "rabi"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["season"], "rabi");

        let (_, list) = send(&app, get("/api/ai-recommendations")).await;
        assert_eq!(list[0]["cropName"], "Wheat");
    }

    #[tokio::test]
    async fn market_limit_is_clamped() {
        let app = app();
        let (status, body) = send(&app, get("/api/agmarknet?limit=5000&commodity=Onion")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["records"], json!([]));
        assert_eq!(body["limit"], 200);

        let (_, body) = send(&app, get("/api/agmarknet?limit=5000&dropdown=true")).await;
        assert_eq!(body["limit"], 2000);

        let (_, body) = send(&app, get("/api/agmarknet?limit=lots")).await;
        assert_eq!(body["limit"], 10);

        let (_, states) = send(&app, get("/api/agmarknet/states")).await;
        assert!(states["data"].as_array().unwrap().contains(&json!("Maharashtra")));
    }

    #[tokio::test]
    async fn unknown_route_body() {
        let (status, body) = send(&app(), get("/api/v2/nothing?x=1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!({"message": "Endpoint not found", "code": "NOT_FOUND"}));
        assert_eq!(body["path"], "/api/v2/nothing?x=1");
        assert_eq!(body["method"], "GET");
    }

    #[tokio::test]
    async fn profile_requires_a_valid_token() {
        let app = app();
        let (status, body) = send(&app, get("/api/v1/user/profile")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Access token required");

        let request = Request::get("/api/v1/user/profile")
            .header(AUTHORIZATION, "Bearer not-a-token")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid or expired token");

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/user/login",
                json!({"email": "test@example.com", "password": "wrong-password"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, login) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/user/login",
                json!({"email": "test@example.com", "password": "password123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = login["data"]["token"].as_str().unwrap();

        let request = Request::get("/api/v1/user/profile")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, profile) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["data"]["id"], "user_123");

        // Refresh tokens are not accepted as access tokens.
        let refresh = login["data"]["refreshToken"].as_str().unwrap();
        let request = Request::get("/api/v1/user/profile")
            .header(AUTHORIZATION, format!("Bearer {refresh}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, renewed) = send(
            &app,
            json_request(Method::POST, "/api/v1/user/refresh-token", json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(renewed["data"]["token"].is_string());
    }

    #[tokio::test]
    async fn register_returns_created() {
        let (status, body) = send(
            &app(),
            json_request(
                Method::POST,
                "/api/v1/user/register",
                json!({"email": "farmer@example.com", "password": "secret1", "name": "Asha"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["user"]["email"], "farmer@example.com");
        assert!(body["data"]["refreshToken"].is_string());
    }

    #[tokio::test]
    async fn fields_and_health() {
        let app = app();
        let (status, fields) = send(&app, get("/api/v1/fields")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fields["data"].as_array().unwrap().len(), 3);
        assert_eq!(fields["data"][1]["temperature"], 25);

        let (status, _) = send(&app, get("/api/v1/fields/field-9")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["environment"], "development");

        let (status, body) = send(&app, get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["services"]["cache"], "healthy");
    }

    #[tokio::test]
    async fn oversized_image_is_rejected() {
        let mut config = GatewayConfig::default();
        config.upload.max_file_size = 4;
        let (status, body) = send(
            &app_with(config),
            json_request(
                Method::POST,
                "/api/v1/ai/diagnose-disease",
                json!({"imageBase64": "AAAAAAAAAAA=", "cropType": "tomato"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Image size too large"));
    }
}
