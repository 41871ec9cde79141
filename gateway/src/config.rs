use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Rate limit window and max requests must be positive")]
    InvalidRateLimit,

    #[error("Upload size limit must be positive")]
    InvalidUploadLimit,

    #[error("A JWT secret must be configured in production")]
    InsecureJwtSecret,

    #[error("Filesystem store needs a base directory")]
    EmptyStoreDir,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Anything other than `production` is treated as development.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

/// Limit applied to every route, per client IP.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            window_secs: 900,
            max_requests: 100,
        }
    }
}

/// The single account login accepts until real user storage exists.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Default for DemoUser {
    fn default() -> Self {
        DemoUser {
            id: "user_123".into(),
            email: "test@example.com".into(),
            password: "password123".into(),
            name: "Test User".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub demo_user: DemoUser,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: DEFAULT_JWT_SECRET.into(),
            demo_user: DemoUser::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreConfig {
    #[default]
    Memory,
    Filesystem {
        base_dir: String,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Bytes, after base64 decoding.
    pub max_file_size: usize,
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            max_file_size: 10 * 1024 * 1024,
            allowed_types: vec!["image/jpeg".into(), "image/png".into(), "image/webp".into()],
        }
    }
}

impl UploadConfig {
    /// Request body limit large enough for a base64 encoded upload.
    pub fn body_limit(&self) -> usize {
        self.max_file_size / 3 * 4 + 64 * 1024
    }
}

/// Settings for the HTTP surface.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub listener: Listener,
    pub environment: Environment,
    pub cors_origin: Option<String>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
    pub upload: UploadConfig,
}

impl GatewayConfig {
    pub const DEFAULT_CORS_ORIGIN: &'static str = "http://localhost:8080";

    pub fn cors_origin(&self) -> &str {
        self.cors_origin.as_deref().unwrap_or(Self::DEFAULT_CORS_ORIGIN)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.listener.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        if self.upload.max_file_size == 0 {
            return Err(ValidationError::InvalidUploadLimit);
        }
        if self.environment.is_production() {
            let secret = self.auth.jwt_secret.trim();
            if secret.is_empty() || secret == DEFAULT_JWT_SECRET {
                return Err(ValidationError::InsecureJwtSecret);
            }
        }
        if matches!(&self.store, StoreConfig::Filesystem { base_dir } if base_dir.trim().is_empty()) {
            return Err(ValidationError::EmptyStoreDir);
        }
        Ok(())
    }
}
