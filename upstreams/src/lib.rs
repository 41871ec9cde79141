//! Clients for the third-party data sources behind the API.
//!
//! Every client either talks to its live upstream or, when no credential is
//! configured, answers from built-in fallback data. Upstream failures are
//! logged and answered with the same fallback, so callers always get a value.

pub mod ai;
pub mod config;
pub mod errors;
mod http;
pub mod language;
pub mod market;
pub mod metrics_defs;
pub mod satellite;
pub mod sms;
pub mod weather;

#[cfg(test)]
mod testutils;

pub use ai::AiClient;
pub use config::{AiConfig, ServiceConfig, UpstreamsConfig};
pub use errors::UpstreamError;
pub use language::Language;
pub use market::MarketClient;
pub use satellite::SatelliteClient;
pub use sms::SmsClient;
pub use weather::WeatherClient;

use std::time::Duration;

const USER_AGENT: &str = concat!("geogrow/", env!("CARGO_PKG_VERSION"));

/// Rounds halves toward positive infinity like `Math.round`, so `-2.5`
/// becomes `-2`.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// All data clients, built once at startup and shared by every handler.
#[derive(Clone)]
pub struct Upstreams {
    pub weather: WeatherClient,
    pub ai: AiClient,
    pub satellite: SatelliteClient,
    pub sms: SmsClient,
    pub market: MarketClient,
}

impl Upstreams {
    pub fn from_config(config: &UpstreamsConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Upstreams {
            weather: WeatherClient::new(&config.weather, client.clone()),
            ai: AiClient::new(&config.ai, client.clone()),
            satellite: SatelliteClient,
            sms: SmsClient,
            market: MarketClient::new(&config.market, client),
        })
    }

    /// Clients that never leave the process.
    pub fn simulated() -> Self {
        Upstreams {
            weather: WeatherClient::simulated(),
            ai: AiClient::simulated(),
            satellite: SatelliteClient,
            sms: SmsClient,
            market: MarketClient::simulated(),
        }
    }
}
