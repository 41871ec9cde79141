//! Per-field dashboard view assembled from weather and satellite readings.

use crate::metrics_defs::FIELD_SOURCE_FAILURES;
use async_trait::async_trait;
use response_cache::ResponseCache;
use response_cache::keys::{satellite_key, weather_key};
use serde::Serialize;
use shared::counter;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use upstreams::satellite::SatelliteData;
use upstreams::weather::WeatherSnapshot;
use upstreams::{Upstreams, round_half_up};

/// Reference coordinate all fields are read at (Pune).
pub const REFERENCE_LAT: f64 = 18.5204;
pub const REFERENCE_LON: f64 = 73.8567;

/// Used when no temperature reading is available.
pub const AMBIENT_TEMPERATURE: i64 = 25;

struct FieldLayout {
    id: &'static str,
    name: &'static str,
    crop_type: &'static str,
    temperature_offset: i64,
}

const FIELDS: [FieldLayout; 3] = [
    FieldLayout {
        id: "field-1",
        name: "North Field",
        crop_type: "Tomato",
        temperature_offset: 0,
    },
    FieldLayout {
        id: "field-2",
        name: "South Field",
        crop_type: "Onion",
        temperature_offset: -3,
    },
    FieldLayout {
        id: "field-3",
        name: "East Field",
        crop_type: "Maize",
        temperature_offset: 2,
    },
];

#[derive(Error, Debug)]
#[error("{source_name} unavailable: {reason}")]
pub struct SourceError {
    pub source_name: &'static str,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub id: &'static str,
    pub name: &'static str,
    pub crop_type: &'static str,
    pub moisture: Option<i64>,
    pub temperature: i64,
    /// Not computed yet; always null.
    pub disease_risk: Option<i64>,
    pub health_score: Option<i64>,
}

#[async_trait]
pub trait FieldDataSource: Send + Sync {
    async fn temperature(&self, lat: f64, lon: f64) -> Result<i64, SourceError>;

    async fn satellite(&self, lat: f64, lon: f64) -> Result<SatelliteData, SourceError>;
}

/// Reads through the response cache, filling it from the data clients on a miss.
pub struct LiveFieldSource {
    cache: ResponseCache,
    upstreams: Upstreams,
}

impl LiveFieldSource {
    pub fn new(cache: ResponseCache, upstreams: Upstreams) -> Self {
        LiveFieldSource { cache, upstreams }
    }
}

#[async_trait]
impl FieldDataSource for LiveFieldSource {
    async fn temperature(&self, lat: f64, lon: f64) -> Result<i64, SourceError> {
        let key = weather_key(lat, lon);
        if let Some(snapshot) = self.cache.get_weather_data::<WeatherSnapshot>(&key) {
            return Ok(snapshot.temperature);
        }
        let snapshot = self.upstreams.weather.current(lat, lon).await;
        self.cache.set_weather_data(&key, &snapshot, None);
        Ok(snapshot.temperature)
    }

    async fn satellite(&self, lat: f64, lon: f64) -> Result<SatelliteData, SourceError> {
        let key = satellite_key(lat, lon);
        if let Some(data) = self.cache.get_satellite_data::<SatelliteData>(&key) {
            return Ok(data);
        }
        let data = self.upstreams.satellite.data(lat, lon);
        self.cache.set_satellite_data(&key, &data, None);
        Ok(data)
    }
}

pub struct FieldService {
    source: Arc<dyn FieldDataSource>,
}

impl FieldService {
    pub fn new(source: Arc<dyn FieldDataSource>) -> Self {
        FieldService { source }
    }

    /// Both readings are fetched concurrently and each falls back on its
    /// own: no temperature gives the ambient default, no satellite reading
    /// gives null moisture and health.
    pub async fn all_fields(&self) -> Vec<FieldView> {
        let (temperature, satellite) = tokio::join!(
            self.source.temperature(REFERENCE_LAT, REFERENCE_LON),
            self.source.satellite(REFERENCE_LAT, REFERENCE_LON),
        );

        let temperature = temperature.unwrap_or_else(|err| {
            counter!(FIELD_SOURCE_FAILURES, "source" => "weather").increment(1);
            warn!(error = %err, "field temperature unavailable");
            AMBIENT_TEMPERATURE
        });
        let (moisture, health_score) = match satellite {
            Ok(data) => (
                Some(round_half_up(data.soil_moisture)),
                Some(round_half_up(data.crop_health)),
            ),
            Err(err) => {
                counter!(FIELD_SOURCE_FAILURES, "source" => "satellite").increment(1);
                warn!(error = %err, "field satellite reading unavailable");
                (None, None)
            }
        };

        FIELDS
            .iter()
            .map(|field| FieldView {
                id: field.id,
                name: field.name,
                crop_type: field.crop_type,
                moisture,
                temperature: temperature + field.temperature_offset,
                disease_risk: None,
                health_score,
            })
            .collect()
    }

    pub async fn field(&self, id: &str) -> Option<FieldView> {
        if !FIELDS.iter().any(|field| field.id == id) {
            return None;
        }
        self.all_fields().await.into_iter().find(|field| field.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use response_cache::CacheConfig;
    use upstreams::SatelliteClient;

    struct Scripted {
        temperature: Option<i64>,
        satellite: Option<SatelliteData>,
    }

    fn down(source_name: &'static str) -> SourceError {
        SourceError {
            source_name,
            reason: "connection refused".into(),
        }
    }

    #[async_trait]
    impl FieldDataSource for Scripted {
        async fn temperature(&self, _lat: f64, _lon: f64) -> Result<i64, SourceError> {
            self.temperature.ok_or_else(|| down("weather"))
        }

        async fn satellite(&self, _lat: f64, _lon: f64) -> Result<SatelliteData, SourceError> {
            self.satellite.clone().ok_or_else(|| down("satellite"))
        }
    }

    fn reading(moisture: f64, health: f64) -> SatelliteData {
        SatelliteData {
            soil_moisture: moisture,
            crop_health: health,
            ..SatelliteClient.data(REFERENCE_LAT, REFERENCE_LON)
        }
    }

    fn service(temperature: Option<i64>, satellite: Option<SatelliteData>) -> FieldService {
        FieldService::new(Arc::new(Scripted {
            temperature,
            satellite,
        }))
    }

    #[tokio::test]
    async fn applies_offsets_and_rounds_readings() {
        let fields = service(Some(30), Some(reading(72.5, 84.4))).all_fields().await;

        let summary: Vec<_> = fields
            .iter()
            .map(|f| (f.id, f.crop_type, f.temperature, f.moisture, f.health_score))
            .collect();
        assert_eq!(
            summary,
            [
                ("field-1", "Tomato", 30, Some(73), Some(84)),
                ("field-2", "Onion", 27, Some(73), Some(84)),
                ("field-3", "Maize", 32, Some(73), Some(84)),
            ]
        );
        assert!(fields.iter().all(|f| f.disease_risk.is_none()));
    }

    #[tokio::test]
    async fn weather_failure_uses_ambient_temperature() {
        let fields = service(None, Some(reading(70.0, 80.0))).all_fields().await;
        let temperatures: Vec<i64> = fields.iter().map(|f| f.temperature).collect();
        assert_eq!(temperatures, [25, 22, 27]);
        assert!(fields.iter().all(|f| f.moisture == Some(70)));
    }

    #[tokio::test]
    async fn satellite_failure_leaves_readings_null() {
        let fields = service(Some(28), None).all_fields().await;
        assert!(fields.iter().all(|f| f.moisture.is_none() && f.health_score.is_none()));
        assert_eq!(fields[0].temperature, 28);

        let json = serde_json::to_value(&fields[1]).unwrap();
        assert_eq!(json["cropType"], "Onion");
        assert!(json["moisture"].is_null());
        assert!(json["diseaseRisk"].is_null());
    }

    #[tokio::test]
    async fn lookup_by_id() {
        let fields = service(Some(28), None);
        assert_eq!(fields.field("field-3").await.map(|f| f.name), Some("East Field"));
        assert_eq!(fields.field("field-9").await, None);
    }

    #[tokio::test]
    async fn live_source_fills_cache() {
        let cache = ResponseCache::new(&CacheConfig::default());
        let source = LiveFieldSource::new(cache.clone(), Upstreams::simulated());
        let service = FieldService::new(Arc::new(source));

        let fields = service.all_fields().await;
        assert_eq!(fields[0].temperature, 28);
        assert!(cache.get(&weather_key(REFERENCE_LAT, REFERENCE_LON)).is_some());
        assert!(cache.get(&satellite_key(REFERENCE_LAT, REFERENCE_LON)).is_some());
    }
}
