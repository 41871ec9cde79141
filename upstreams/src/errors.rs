use reqwest::StatusCode;
use thiserror::Error;

/// Why a live upstream call produced no usable data.
///
/// These never escape the clients; they decide which fallback is logged.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("{0} request timed out")]
    Timeout(&'static str),

    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },

    #[error("Invalid response format from {service}: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    pub fn outcome(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Status { .. } => "status",
            UpstreamError::InvalidResponse { .. } => "invalid_response",
            UpstreamError::Reqwest(_) | UpstreamError::InvalidUrl(_) => "error",
        }
    }
}
