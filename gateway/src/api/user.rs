//! Account endpoints backed by the single configured demo account.

use crate::api::response::{Envelope, timestamp};
use crate::auth::{Claims, Principal, TokenPair, TokenType};
use crate::errors::ApiError;
use crate::state::AppState;
use crate::validation::{ValidJson, Validate, ValidationErrors};
use axum::http::StatusCode;
use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

const USER_ROLE: &str = "user";

fn issue(state: &AppState, principal: &Principal<'_>) -> Result<TokenPair, ApiError> {
    state.tokens.issue(principal).map_err(|err| {
        error!(error = %err, "failed to sign token");
        ApiError::Internal {
            message: "Failed to issue token".into(),
            detail: state.detail(&err),
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    phone_number: Option<String>,
    location: Option<String>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("email", self.email.as_deref());
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            errors.email("email", email);
        }
        errors.required("password", self.password.as_deref());
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            errors.length("password", password, 6, usize::MAX);
        }
        errors.required("name", self.name.as_deref());
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            errors.length("name", name, 2, 50);
        }
        if let Some(phone) = self.phone_number.as_deref() {
            errors.phone_number("phoneNumber", phone);
        }
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    id: String,
    email: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session<U> {
    user: U,
    #[serde(flatten)]
    tokens: TokenPair,
}

/// Nothing is stored: the account exists only inside the issued tokens.
pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Envelope<Session<RegisteredUser>>), ApiError> {
    let user = RegisteredUser {
        id: format!("user_{}", Utc::now().timestamp_millis()),
        email: request.email.unwrap_or_default(),
        name: request.name.unwrap_or_default(),
        phone_number: request.phone_number,
        location: request.location,
    };
    let tokens = issue(
        &state,
        &Principal {
            id: &user.id,
            email: &user.email,
            role: USER_ROLE,
        },
    )?;

    info!(email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Envelope::ok(Session { user, tokens })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("email", self.email.as_deref());
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            errors.email("email", email);
        }
        errors.required("password", self.password.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct LoggedInUser {
    id: String,
    email: String,
    name: String,
    role: &'static str,
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<Envelope<Session<LoggedInUser>>, ApiError> {
    let account = &state.config.auth.demo_user;
    let email = request.email.unwrap_or_default();
    if email != account.email || request.password.as_deref() != Some(account.password.as_str()) {
        warn!(%email, "login rejected");
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    let tokens = issue(
        &state,
        &Principal {
            id: &account.id,
            email: &account.email,
            role: USER_ROLE,
        },
    )?;
    info!(%email, "user logged in");

    Ok(Envelope::ok(Session {
        user: LoggedInUser {
            id: account.id.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
            role: USER_ROLE,
        },
        tokens,
    }))
}

fn default_preferences() -> Value {
    json!({ "language": "english", "notifications": true })
}

pub async fn profile(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> Json<Value> {
    let account = &state.config.auth.demo_user;
    Json(json!({
        "success": true,
        "data": {
            "id": claims.sub,
            "email": claims.email,
            "name": account.name,
            "phoneNumber": "6290277345",
            "location": "Maharashtra",
            "preferences": default_preferences(),
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    name: Option<String>,
    phone_number: Option<String>,
    location: Option<String>,
    preferences: Option<Value>,
}

impl Validate for ProfileUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(name) = &self.name {
            errors.length("name", name, 2, 50);
        }
        if let Some(phone) = &self.phone_number {
            errors.phone_number("phoneNumber", phone);
        }
        if self.preferences.as_ref().is_some_and(|p| !p.is_object()) {
            errors.push("preferences", "\"preferences\" must be of type object");
        }
        errors.into_result()
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(update): ValidJson<ProfileUpdate>,
) -> Json<Value> {
    let account = &state.config.auth.demo_user;
    info!(user_id = %claims.sub, "profile updated");
    Json(json!({
        "success": true,
        "data": {
            "id": claims.sub,
            "email": claims.email,
            "name": update.name.unwrap_or_else(|| account.name.clone()),
            "phoneNumber": update.phone_number.unwrap_or_else(|| "6290277345".into()),
            "location": update.location.unwrap_or_else(|| "Maharashtra".into()),
            "preferences": update.preferences.unwrap_or_else(default_preferences),
            "updatedAt": timestamp(),
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    refresh_token: Option<String>,
}

impl Validate for RefreshRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("refreshToken", self.refresh_token.as_deref());
        errors.into_result()
    }
}

pub async fn refresh_token(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RefreshRequest>,
) -> Result<Envelope<TokenPair>, ApiError> {
    let token = request.refresh_token.unwrap_or_default();
    let claims = state.tokens.verify(&token, TokenType::Refresh).map_err(|err| {
        warn!(error = %err, "token refresh rejected");
        ApiError::Unauthorized("Invalid refresh token")
    })?;

    let tokens = issue(
        &state,
        &Principal {
            id: &claims.sub,
            email: &claims.email,
            role: USER_ROLE,
        },
    )?;
    Ok(Envelope::ok(tokens))
}

pub async fn logout(Extension(claims): Extension<Claims>) -> Json<Value> {
    info!(user_id = %claims.sub, "user logged out");
    Json(json!({ "success": true, "message": "Logged out successfully" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": timestamp(),
        "message": "User service operational",
    }))
}
