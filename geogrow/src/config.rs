use gateway::GatewayConfig;
use gateway::config::{Environment, StoreConfig, ValidationError};
use response_cache::CacheConfig;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use upstreams::{ServiceConfig, UpstreamsConfig};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub level: String,
    pub sentry_dsn: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".into(),
            sentry_dsn: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub gateway: GatewayConfig,
    pub upstreams: UpstreamsConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub metrics: Option<MetricsConfig>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid {service} base URL: {url:?}")]
    InvalidBaseUrl { service: &'static str, url: String },
    #[error("cache check period must be positive")]
    InvalidCachePeriod,
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Overrides file settings with environment variables. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty())
        };

        if let Some(key) = var(&["GEMINI_API_KEY"]) {
            self.upstreams.ai.service.api_key = Some(key);
        }
        if let Some(key) = var(&["TOMORROW_IO_API_KEY"]) {
            self.upstreams.weather.api_key = Some(key);
        }
        if let Some(key) = var(&["AGMARKNET_API_KEY", "VITE_AGMARKNET_API_KEY"]) {
            self.upstreams.market.api_key = Some(key);
        }
        if let Some(url) = var(&["AGMARKNET_API_URL", "VITE_AGMARKNET_API_URL"]) {
            self.upstreams.market.base_url = url;
        }
        if let Some(secret) = var(&["JWT_SECRET"]) {
            self.gateway.auth.jwt_secret = secret;
        }
        if let Some(origin) = var(&["CORS_ORIGIN"]) {
            self.gateway.cors_origin = Some(origin);
        }
        if let Some(level) = var(&["LOG_LEVEL"]) {
            self.logging.level = level;
        }
        if let Some(dsn) = var(&["SENTRY_DSN"]) {
            self.logging.sentry_dsn = Some(dsn);
        }
        if let Some(port) = var(&["PORT"]) {
            self.gateway.listener.port = parse_env("PORT", port)?;
        }
        if let Some(environment) = var(&["NODE_ENV", "ENVIRONMENT"]) {
            self.gateway.environment = Environment::from_name(&environment);
        }
        if let Some(base_dir) = var(&["DATA_DIR"]) {
            self.gateway.store = StoreConfig::Filesystem { base_dir };
        }
        if let Some(window) = var(&["RATE_LIMIT_WINDOW_MS"]) {
            let millis: u64 = parse_env("RATE_LIMIT_WINDOW_MS", window)?;
            self.gateway.rate_limit.window_secs = millis.div_ceil(1000);
        }
        if let Some(max) = var(&["RATE_LIMIT_MAX_REQUESTS"]) {
            self.gateway.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX_REQUESTS", max)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;

        let services: [(&'static str, &ServiceConfig); 3] = [
            ("weather", &self.upstreams.weather),
            ("ai", &self.upstreams.ai.service),
            ("market", &self.upstreams.market),
        ];
        for (service, config) in services {
            if config.base_url.trim().is_empty() || config.parsed_base_url().is_err() {
                return Err(ConfigError::InvalidBaseUrl {
                    service,
                    url: config.base_url.clone(),
                });
            }
        }

        if self.cache.check_period_secs == 0 {
            return Err(ConfigError::InvalidCachePeriod);
        }
        Ok(())
    }
}
