//! Weather conditions and forecasts from Tomorrow.io.

use crate::config::ServiceConfig;
use crate::errors::UpstreamError;
use crate::http::{Call, DATA_TIMEOUT, endpoint, fallback_after, send_json};
use crate::round_half_up;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

const SERVICE: &str = "Tomorrow.io";
const CURRENT: Call = Call {
    service: SERVICE,
    endpoint: "current-weather",
    timeout: DATA_TIMEOUT,
};
const FORECAST: Call = Call {
    service: SERVICE,
    endpoint: "forecast",
    timeout: DATA_TIMEOUT,
};
const ALERTS: Call = Call {
    service: SERVICE,
    endpoint: "alerts",
    timeout: DATA_TIMEOUT,
};

/// Labels are assigned by position in the forecast, not by calendar day.
const DAY_LABELS: [&str; 7] = ["Today", "Tomorrow", "Wed", "Thu", "Fri", "Sat", "Sun"];
const SUNRISE: &str = "6:15 AM";
const SUNSET: &str = "6:45 PM";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub temperature: i64,
    pub condition: String,
    pub humidity: i64,
    /// km/h
    pub wind_speed: i64,
    pub visibility: i64,
    pub pressure: i64,
    pub sunrise: String,
    pub sunset: String,
    pub forecast: Vec<ForecastDay>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub day: String,
    pub high: i64,
    pub low: i64,
    pub condition: String,
    /// Chance of rain in percent.
    pub rain: i64,
    pub icon: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAlert {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub valid_from: String,
    pub valid_to: String,
}

/// Human readable condition for a Tomorrow.io weather code.
pub fn condition_for(code: Option<i64>) -> &'static str {
    match code {
        Some(0) => "Unknown",
        Some(1000) => "Clear",
        Some(1001) => "Cloudy",
        Some(1100) => "Mostly Clear",
        Some(1101) => "Partly Cloudy",
        Some(1102) => "Mostly Cloudy",
        Some(2000) => "Fog",
        Some(2100) => "Light Fog",
        Some(4000) => "Drizzle",
        Some(4001) => "Rain",
        Some(4200) => "Light Rain",
        Some(4201) => "Heavy Rain",
        Some(5000) => "Snow",
        Some(5001) => "Flurries",
        Some(5100) => "Light Snow",
        Some(5101) => "Heavy Snow",
        Some(6000) => "Freezing Drizzle",
        Some(6001) => "Freezing Rain",
        Some(6200) => "Light Freezing Rain",
        Some(6201) => "Heavy Freezing Rain",
        Some(7000) => "Ice Pellets",
        Some(7101) => "Heavy Ice Pellets",
        Some(7102) => "Light Ice Pellets",
        Some(8000) => "Thunderstorm",
        _ => "Partly Cloudy",
    }
}

pub fn icon_for(code: Option<i64>) -> &'static str {
    match code {
        Some(1000) => "☀️",
        Some(1001) | Some(1102) => "☁️",
        Some(1100) => "🌤️",
        Some(1101) => "⛅",
        Some(2000) | Some(2100) => "🌫️",
        Some(4000) | Some(4200) => "🌦️",
        Some(4001) => "🌧️",
        Some(4201) | Some(8000) => "⛈️",
        Some(5000) | Some(5101) => "❄️",
        Some(5001) | Some(5100) => "🌨️",
        _ => "⛅",
    }
}

pub fn fallback_current() -> WeatherSnapshot {
    WeatherSnapshot {
        temperature: 28,
        condition: "Partly Cloudy".to_string(),
        humidity: 65,
        wind_speed: 12,
        visibility: 10,
        pressure: 1013,
        sunrise: SUNRISE.to_string(),
        sunset: SUNSET.to_string(),
        forecast: Vec::new(),
    }
}

pub fn fallback_forecast() -> Vec<ForecastDay> {
    [
        ("Today", 32, 24, "Partly Cloudy", 10, "⛅"),
        ("Tomorrow", 29, 22, "Rainy", 80, "🌧️"),
        ("Wed", 26, 20, "Heavy Rain", 90, "⛈️"),
        ("Thu", 30, 23, "Cloudy", 30, "☁️"),
        ("Fri", 33, 25, "Sunny", 5, "☀️"),
        ("Sat", 31, 24, "Partly Cloudy", 15, "⛅"),
        ("Sun", 28, 21, "Thunderstorm", 85, "⛈️"),
    ]
    .into_iter()
    .map(|(day, high, low, condition, rain, icon)| ForecastDay {
        day: day.to_string(),
        high,
        low,
        condition: condition.to_string(),
        rain,
        icon: icon.to_string(),
    })
    .collect()
}

pub fn fallback_alerts() -> Vec<WeatherAlert> {
    let now = Utc::now();
    vec![WeatherAlert {
        alert_type: "rain".to_string(),
        severity: Severity::Medium,
        message: "Heavy rainfall expected in the next 24 hours".to_string(),
        valid_from: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        valid_to: (now + ChronoDuration::hours(24)).to_rfc3339_opts(SecondsFormat::Millis, true),
    }]
}

#[derive(Deserialize)]
struct RealtimeResponse {
    data: RealtimeData,
}

#[derive(Deserialize)]
struct RealtimeData {
    values: RealtimeValues,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeValues {
    temperature: f64,
    humidity: f64,
    /// m/s
    wind_speed: f64,
    visibility: f64,
    pressure_sea_level: f64,
    weather_code: Option<i64>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    data: ForecastData,
}

#[derive(Deserialize)]
struct ForecastData {
    timelines: Vec<Timeline>,
}

#[derive(Deserialize)]
struct Timeline {
    intervals: Vec<Interval>,
}

#[derive(Deserialize)]
struct Interval {
    values: IntervalValues,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntervalValues {
    temperature_max: f64,
    temperature_min: f64,
    weather_code: Option<i64>,
    #[serde(default)]
    precipitation_probability: f64,
}

#[derive(Deserialize)]
struct AlertsResponse {
    data: Option<AlertsData>,
}

#[derive(Deserialize)]
struct AlertsData {
    alerts: Option<Vec<RawAlert>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAlert {
    #[serde(rename = "type", default)]
    alert_type: String,
    severity: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    valid_from: String,
    #[serde(default)]
    valid_to: String,
}

impl From<RawAlert> for WeatherAlert {
    fn from(raw: RawAlert) -> Self {
        WeatherAlert {
            alert_type: raw.alert_type,
            severity: raw
                .severity
                .as_deref()
                .and_then(Severity::from_name)
                .unwrap_or(Severity::Medium),
            message: raw.title,
            valid_from: raw.valid_from,
            valid_to: raw.valid_to,
        }
    }
}

#[derive(Clone)]
struct LiveWeather {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl LiveWeather {
    fn request(&self, path: &str, lat: f64, lon: f64) -> Result<reqwest::RequestBuilder, UpstreamError> {
        let url = endpoint(&self.base_url, path)?;
        Ok(self.client.get(url).query(&[
            ("location", format!("{lat},{lon}")),
            ("apikey", self.api_key.clone()),
        ]))
    }

    async fn current(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, UpstreamError> {
        let request = self.request("weather/realtime", lat, lon)?;
        let response: RealtimeResponse = send_json(CURRENT, request).await?;
        let values = response.data.values;

        Ok(WeatherSnapshot {
            temperature: round_half_up(values.temperature),
            condition: condition_for(values.weather_code).to_string(),
            humidity: round_half_up(values.humidity),
            wind_speed: round_half_up(values.wind_speed * 3.6),
            visibility: round_half_up(values.visibility),
            pressure: round_half_up(values.pressure_sea_level),
            sunrise: SUNRISE.to_string(),
            sunset: SUNSET.to_string(),
            forecast: Vec::new(),
        })
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastDay>, UpstreamError> {
        let request = self
            .request("weather/forecast", lat, lon)?
            .query(&[("timesteps", "1d"), ("units", "metric")]);
        let response: ForecastResponse = send_json(FORECAST, request).await?;

        let timeline = response
            .data
            .timelines
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::InvalidResponse {
                service: SERVICE,
                reason: "forecast has no timelines".to_string(),
            })?;

        Ok(timeline
            .intervals
            .into_iter()
            .zip(DAY_LABELS)
            .map(|(interval, day)| {
                let values = interval.values;
                ForecastDay {
                    day: day.to_string(),
                    high: round_half_up(values.temperature_max),
                    low: round_half_up(values.temperature_min),
                    condition: condition_for(values.weather_code).to_string(),
                    rain: round_half_up(values.precipitation_probability),
                    icon: icon_for(values.weather_code).to_string(),
                }
            })
            .collect())
    }

    async fn alerts(&self, lat: f64, lon: f64) -> Result<Vec<WeatherAlert>, UpstreamError> {
        let request = self.request("weather/alerts", lat, lon)?;
        let response: AlertsResponse = send_json(ALERTS, request).await?;

        let alerts = response.data.and_then(|data| data.alerts).unwrap_or_default();
        Ok(alerts.into_iter().map(WeatherAlert::from).collect())
    }
}

#[derive(Clone)]
enum Source {
    Live(LiveWeather),
    Simulated,
}

/// Weather data for a coordinate, live or from fallback values.
#[derive(Clone)]
pub struct WeatherClient(Source);

impl WeatherClient {
    pub fn new(config: &ServiceConfig, client: reqwest::Client) -> Self {
        let Some(api_key) = config.credential() else {
            warn!("Tomorrow.io API key not configured, serving fallback weather");
            return Self::simulated();
        };

        match config.parsed_base_url() {
            Ok(base_url) => WeatherClient(Source::Live(LiveWeather {
                client,
                base_url,
                api_key: api_key.to_string(),
            })),
            Err(err) => {
                warn!(error = %err, "weather base URL is invalid, serving fallback weather");
                Self::simulated()
            }
        }
    }

    pub fn simulated() -> Self {
        WeatherClient(Source::Simulated)
    }

    pub fn is_live(&self) -> bool {
        matches!(self.0, Source::Live(_))
    }

    pub async fn current(&self, lat: f64, lon: f64) -> WeatherSnapshot {
        let Source::Live(live) = &self.0 else {
            return fallback_current();
        };
        live.current(lat, lon).await.unwrap_or_else(|err| {
            fallback_after(CURRENT, &err);
            fallback_current()
        })
    }

    /// At most seven days.
    pub async fn forecast(&self, lat: f64, lon: f64) -> Vec<ForecastDay> {
        let Source::Live(live) = &self.0 else {
            return fallback_forecast();
        };
        live.forecast(lat, lon).await.unwrap_or_else(|err| {
            fallback_after(FORECAST, &err);
            fallback_forecast()
        })
    }

    /// An upstream answer without an alert list means there are no alerts.
    pub async fn alerts(&self, lat: f64, lon: f64) -> Vec<WeatherAlert> {
        let Source::Live(live) = &self.0 else {
            return fallback_alerts();
        };
        live.alerts(lat, lon).await.unwrap_or_else(|err| {
            fallback_after(ALERTS, &err);
            fallback_alerts()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{closed_upstream, spawn_upstream};
    use axum::Router;
    use axum::extract::Query;
    use axum::routing::get;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn live(base_url: &Url) -> WeatherClient {
        let config = ServiceConfig {
            api_key: Some("test-key".into()),
            base_url: base_url.to_string(),
        };
        WeatherClient::new(&config, reqwest::Client::new())
    }

    async fn realtime(Query(params): Query<HashMap<String, String>>) -> axum::Json<Value> {
        assert_eq!(params.get("apikey").map(String::as_str), Some("test-key"));
        assert_eq!(params.get("location").map(String::as_str), Some("18.5204,73.8567"));
        axum::Json(json!({
            "data": {"values": {
                "temperature": 29.6,
                "humidity": 71.2,
                "windSpeed": 3.5,
                "visibility": 9.5,
                "pressureSeaLevel": 1008.4,
                "weatherCode": 4001
            }}
        }))
    }

    async fn forecast() -> axum::Json<Value> {
        let intervals: Vec<Value> = (0..9)
            .map(|i| {
                json!({"values": {
                    "temperatureMax": 30.5 + i as f64,
                    "temperatureMin": 20.4,
                    "weatherCode": 1000,
                    "precipitationProbability": 12.5
                }})
            })
            .collect();
        axum::Json(json!({"data": {"timelines": [{"intervals": intervals}]}}))
    }

    #[test]
    fn fallback_snapshot_wire_format() {
        let body = serde_json::to_value(fallback_current()).unwrap();
        assert_eq!(
            body,
            json!({
                "temperature": 28,
                "condition": "Partly Cloudy",
                "humidity": 65,
                "windSpeed": 12,
                "visibility": 10,
                "pressure": 1013,
                "sunrise": "6:15 AM",
                "sunset": "6:45 PM",
                "forecast": []
            })
        );
    }

    #[test]
    fn condition_and_icon_tables() {
        assert_eq!(condition_for(Some(4201)), "Heavy Rain");
        assert_eq!(condition_for(Some(0)), "Unknown");
        assert_eq!(condition_for(Some(9999)), "Partly Cloudy");
        assert_eq!(condition_for(None), "Partly Cloudy");
        assert_eq!(icon_for(Some(1000)), "☀️");
        assert_eq!(icon_for(Some(6000)), "⛅");
    }

    #[tokio::test]
    async fn simulated_client_serves_fallbacks() {
        let client = WeatherClient::simulated();
        assert!(!client.is_live());
        assert_eq!(client.current(1.0, 2.0).await, fallback_current());

        let forecast = client.forecast(1.0, 2.0).await;
        assert_eq!(forecast, fallback_forecast());
        assert_eq!(forecast.len(), 7);
        assert_eq!(forecast[1].condition, "Rainy");

        let alerts = client.alerts(1.0, 2.0).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Medium);
    }

    #[test]
    fn blank_key_is_simulated() {
        let config = ServiceConfig {
            api_key: Some(String::new()),
            base_url: "http://127.0.0.1:1".into(),
        };
        assert!(!WeatherClient::new(&config, reqwest::Client::new()).is_live());
    }

    #[tokio::test]
    async fn live_current_maps_and_rounds() {
        let base = spawn_upstream(Router::new().route("/weather/realtime", get(realtime))).await;
        let snapshot = live(&base).current(18.5204, 73.8567).await;

        assert_eq!(
            snapshot,
            WeatherSnapshot {
                temperature: 30,
                condition: "Rain".into(),
                humidity: 71,
                wind_speed: 13,
                visibility: 10,
                pressure: 1008,
                sunrise: "6:15 AM".into(),
                sunset: "6:45 PM".into(),
                forecast: vec![],
            }
        );
    }

    #[tokio::test]
    async fn live_forecast_truncates_to_seven_positional_days() {
        let base = spawn_upstream(Router::new().route("/weather/forecast", get(forecast))).await;
        let days = live(&base).forecast(18.5204, 73.8567).await;

        assert_eq!(days.len(), 7);
        let labels: Vec<&str> = days.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(labels, DAY_LABELS);
        assert_eq!(days[0].high, 31);
        assert_eq!(days[0].low, 20);
        assert_eq!(days[0].rain, 13);
        assert_eq!(days[0].condition, "Clear");
        assert_eq!(days[0].icon, "☀️");
    }

    #[tokio::test]
    async fn missing_alert_list_is_empty() {
        let app = Router::new().route(
            "/weather/alerts",
            get(|| async { axum::Json(json!({"data": {}})) }),
        );
        let base = spawn_upstream(app).await;
        assert!(live(&base).alerts(1.0, 2.0).await.is_empty());
    }

    #[tokio::test]
    async fn alert_severity_defaults_to_medium() {
        let app = Router::new().route(
            "/weather/alerts",
            get(|| async {
                axum::Json(json!({"data": {"alerts": [
                    {"type": "wind", "title": "Strong winds", "validFrom": "a", "validTo": "b"},
                    {"type": "heat", "severity": "high", "title": "Heatwave", "validFrom": "c", "validTo": "d"}
                ]}}))
            }),
        );
        let base = spawn_upstream(app).await;
        let alerts = live(&base).alerts(1.0, 2.0).await;

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert_eq!(alerts[0].message, "Strong winds");
        assert_eq!(alerts[1].severity, Severity::High);
        assert_eq!(alerts[1].alert_type, "heat");
    }

    #[tokio::test]
    async fn failures_fall_back() {
        let app = Router::new()
            .route("/weather/realtime", get(|| async { axum::Json(json!({"data": {}})) }))
            .route(
                "/weather/forecast",
                get(|| async { axum::Json(json!({"data": {"timelines": []}})) }),
            );
        let base = spawn_upstream(app).await;
        let client = live(&base);
        assert_eq!(client.current(1.0, 2.0).await, fallback_current());
        assert_eq!(client.forecast(1.0, 2.0).await, fallback_forecast());

        let unreachable = live(&closed_upstream().await);
        assert_eq!(unreachable.current(1.0, 2.0).await, fallback_current());
        assert_eq!(unreachable.alerts(1.0, 2.0).await.len(), 1);
    }
}
