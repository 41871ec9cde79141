use crate::validation::ValidationErrors;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;

/// Every way a request can fail, mapped onto the JSON bodies clients expect.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    RateLimited(&'static str),

    #[error("{message}")]
    Unavailable { message: &'static str },

    /// `detail` is only filled in outside production.
    #[error("{message}")]
    Internal {
        message: String,
        detail: Option<String>,
    },

    /// Errors of the document endpoints, which answer with `{message}`.
    #[error("{message}")]
    Document {
        status: StatusCode,
        message: String,
        detail: Option<String>,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn document(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Document {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Document { status, .. } => *status,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!({
                "success": false,
                "error": "Validation failed",
                "details": errors,
            }),
            ApiError::RateLimited(message) => json!({ "error": message }),
            ApiError::Unavailable { message } => json!({
                "success": false,
                "status": "unhealthy",
                "error": message,
            }),
            ApiError::Internal { message, detail } => {
                let mut body = json!({ "success": false, "error": message });
                if let Some(detail) = detail {
                    body["details"] = json!(detail);
                }
                body
            }
            ApiError::Document {
                message, detail, ..
            } => {
                let mut body = json!({ "message": message });
                if let Some(detail) = detail {
                    body["error"] = json!(detail);
                }
                body
            }
            ApiError::BadRequest(_)
            | ApiError::Unauthorized(_)
            | ApiError::Forbidden(_)
            | ApiError::NotFound(_) => json!({
                "success": false,
                "error": self.to_string(),
            }),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_by_variant() {
        let mut errors = ValidationErrors::default();
        errors.push("lat", "\"lat\" must be less than or equal to 90");
        let error = ApiError::from(errors);
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body(),
            json!({
                "success": false,
                "error": "Validation failed",
                "details": [{"field": "lat", "message": "\"lat\" must be less than or equal to 90"}],
            })
        );

        let error = ApiError::RateLimited("Too many requests from this IP, please try again later.");
        assert_eq!(error.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            error.body(),
            json!({"error": "Too many requests from this IP, please try again later."})
        );

        let error = ApiError::Forbidden("Invalid or expired token");
        assert_eq!(
            error.body(),
            json!({"success": false, "error": "Invalid or expired token"})
        );
    }

    #[test]
    fn internal_detail_is_optional() {
        let hidden = ApiError::Internal {
            message: "Failed to save".into(),
            detail: None,
        };
        assert_eq!(hidden.body(), json!({"success": false, "error": "Failed to save"}));

        let shown = ApiError::Document {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Server error creating record".into(),
            detail: Some("disk full".into()),
        };
        assert_eq!(
            shown.body(),
            json!({"message": "Server error creating record", "error": "disk full"})
        );
    }
}
