use crate::errors::UpstreamError;
use serde::Deserialize;
use url::Url;

/// Connection settings for one upstream API.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ServiceConfig {
    fn with_base(base_url: &str) -> Self {
        ServiceConfig {
            api_key: None,
            base_url: base_url.to_string(),
        }
    }

    pub fn parsed_base_url(&self) -> Result<Url, UpstreamError> {
        Url::parse(&self.base_url).map_err(|e| UpstreamError::InvalidUrl(format!("{}: {e}", self.base_url)))
    }

    /// The API key, if one is configured and not blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AiConfig {
    #[serde(flatten)]
    pub service: ServiceConfig,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            service: ServiceConfig::with_base(GEMINI_BASE_URL),
            chat_model: default_chat_model(),
            vision_model: default_vision_model(),
        }
    }
}

fn default_chat_model() -> String {
    "gemini-pro".to_string()
}

fn default_vision_model() -> String {
    "gemini-pro-vision".to_string()
}

pub const TOMORROW_IO_BASE_URL: &str = "https://api.tomorrow.io/v4";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const AGMARKNET_BASE_URL: &str = "https://api.data.gov.in/resource/";

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamsConfig {
    #[serde(default = "default_weather")]
    pub weather: ServiceConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default = "default_market")]
    pub market: ServiceConfig,
}

fn default_weather() -> ServiceConfig {
    ServiceConfig::with_base(TOMORROW_IO_BASE_URL)
}

fn default_market() -> ServiceConfig {
    ServiceConfig::with_base(AGMARKNET_BASE_URL)
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        UpstreamsConfig {
            weather: default_weather(),
            ai: AiConfig::default(),
            market: default_market(),
        }
    }
}
