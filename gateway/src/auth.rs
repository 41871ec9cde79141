//! HS256 access and refresh tokens.

use crate::errors::ApiError;
use crate::metrics_defs::AUTH_FAILURES;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use shared::counter;
use thiserror::Error;
use tracing::warn;

const ACCESS_TTL_HOURS: i64 = 24;
const REFRESH_TTL_DAYS: i64 = 7;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("JWT processing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("expected a {expected:?} token")]
    WrongTokenType { expected: TokenType },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Identity carried into tokens.
#[derive(Clone, Debug)]
pub struct Principal<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub role: &'a str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        TokenIssuer {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    pub fn issue(&self, principal: &Principal<'_>) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access = Claims {
            sub: principal.id.to_string(),
            email: principal.email.to_string(),
            role: Some(principal.role.to_string()),
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: (now + Duration::hours(ACCESS_TTL_HOURS)).timestamp(),
        };
        let refresh = Claims {
            role: None,
            token_type: TokenType::Refresh,
            exp: (now + Duration::days(REFRESH_TTL_DAYS)).timestamp(),
            ..access.clone()
        };

        Ok(TokenPair {
            token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
        })
    }

    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType { expected });
        }
        Ok(claims)
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    header.split_whitespace().nth(1)
}

/// Rejects requests without a valid access token and makes its [`Claims`]
/// available to the handler as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let Some(token) = bearer_token(&request) else {
        counter!(AUTH_FAILURES, "reason" => "missing").increment(1);
        warn!(path, "authentication failed: no token provided");
        return Err(ApiError::Unauthorized("Access token required"));
    };

    let claims = state
        .tokens
        .verify(token, TokenType::Access)
        .map_err(|err| {
            counter!(AUTH_FAILURES, "reason" => "invalid").increment(1);
            warn!(path, error = %err, "authentication failed: invalid token");
            ApiError::Forbidden("Invalid or expired token")
        })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
