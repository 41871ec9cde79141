//! Request validation.
//!
//! Request types are deserialized first and then checked by
//! [`Validate::validate`], which reports every failing field at once.
//! [`ValidJson`] and [`ValidQuery`] run both steps before a handler is called.

use crate::errors::ApiError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|error| error.field.as_str())
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn required(&mut self, field: &str, value: Option<&str>) {
        match value {
            None => self.push(field, format!("\"{field}\" is required")),
            Some(value) if value.is_empty() => {
                self.push(field, format!("\"{field}\" is not allowed to be empty"))
            }
            Some(_) => {}
        }
    }

    /// Length in characters, inclusive on both ends.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let length = value.chars().count();
        if length < min {
            self.push(
                field,
                format!("\"{field}\" length must be at least {min} characters long"),
            );
        } else if length > max {
            self.push(
                field,
                format!("\"{field}\" length must be less than or equal to {max} characters long"),
            );
        }
    }

    pub fn range(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !value.is_finite() {
            self.push(field, format!("\"{field}\" must be a number"));
        } else if value < min {
            self.push(field, format!("\"{field}\" must be greater than or equal to {min}"));
        } else if value > max {
            self.push(field, format!("\"{field}\" must be less than or equal to {max}"));
        }
    }

    pub fn phone_number(&mut self, field: &str, value: &str) {
        if !is_phone_number(value) {
            self.push(
                field,
                format!("\"{field}\" must be a 10 digit phone number"),
            );
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !is_email(value) {
            self.push(field, format!("\"{field}\" must be a valid email"));
        }
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.push(
                field,
                format!("\"{field}\" must be one of [{}]", allowed.join(", ")),
            );
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

pub fn is_phone_number(value: &str) -> bool {
    value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit())
}

/// A pragmatic address check: one `@`, a non-empty local part and a dotted
/// domain, without whitespace.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
        && !value.chars().any(char::is_whitespace)
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

fn malformed(field: &str, message: String) -> ApiError {
    let mut errors = ValidationErrors::default();
    errors.push(field, message);
    ApiError::Validation(errors)
}

fn rejected(errors: ValidationErrors, path: &str) -> ApiError {
    warn!(
        path,
        fields = ?errors.fields().collect::<Vec<_>>(),
        "validation error"
    );
    ApiError::Validation(errors)
}

/// JSON body that has passed validation.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let path = request.uri().path().to_string();
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection: JsonRejection| malformed("body", rejection.body_text()))?;
        value.validate().map_err(|errors| rejected(errors, &path))?;
        Ok(ValidJson(value))
    }
}

/// Query string that has passed validation.
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| malformed("query", rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| rejected(errors, parts.uri.path()))?;
        Ok(ValidQuery(value))
    }
}
