//! Simulated satellite imagery analysis.
//!
//! No imagery provider is wired in. Readings are derived from the
//! coordinate so that the same field always reports the same values.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteData {
    /// Percent.
    pub soil_moisture: f64,
    /// Percent.
    pub crop_health: f64,
    pub vegetation_index: f64,
    pub last_updated: String,
    pub geospatial_analysis: GeospatialAnalysis,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeospatialAnalysis {
    pub field_boundaries: Vec<FieldBoundary>,
    pub crop_classification: Vec<CropClassification>,
    pub health_analysis: HealthAnalysis,
}

/// A closed polygon of `[lon, lat]` points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldBoundary {
    pub coordinates: Vec<[f64; 2]>,
    /// Hectares.
    pub area: f64,
    pub crop_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropClassification {
    pub crop_type: String,
    pub confidence: f64,
    pub area: f64,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAnalysis {
    pub overall_health: i64,
    pub stress_areas: Vec<FieldBoundary>,
    pub recommendations: Vec<String>,
}

/// Generator seeded from the coordinate at cache key precision, so that
/// requests sharing a cache key also share readings.
fn readings_rng(lat: f64, lon: f64) -> StdRng {
    let lat = (lat * 1e4).round() as i64 as u64;
    let lon = (lon * 1e4).round() as i64 as u64;
    StdRng::seed_from_u64(lat.rotate_left(32) ^ lon)
}

/// Axis aligned square polygon, closed by repeating the first point.
fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Vec<[f64; 2]> {
    vec![
        [min_lon, min_lat],
        [max_lon, min_lat],
        [max_lon, max_lat],
        [min_lon, max_lat],
        [min_lon, min_lat],
    ]
}

fn wheat_plot(lat: f64, lon: f64) -> FieldBoundary {
    FieldBoundary {
        coordinates: square(lon - 0.01, lat - 0.01, lon + 0.01, lat + 0.01),
        area: 2.5,
        crop_type: "wheat".to_string(),
    }
}

fn cotton_plot(lat: f64, lon: f64) -> FieldBoundary {
    FieldBoundary {
        coordinates: square(lon - 0.015, lat + 0.005, lon - 0.005, lat + 0.015),
        area: 1.8,
        crop_type: "cotton".to_string(),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SatelliteClient;

impl SatelliteClient {
    pub fn data(&self, lat: f64, lon: f64) -> SatelliteData {
        let mut rng = readings_rng(lat, lon);
        SatelliteData {
            soil_moisture: 78.0 + 10.0 * rng.gen_range(-1.0..1.0),
            crop_health: 85.0 + 5.0 * rng.gen_range(-1.0..1.0),
            vegetation_index: 0.65 + 0.1 * rng.gen_range(-1.0..1.0),
            last_updated: "2 hours ago".to_string(),
            geospatial_analysis: GeospatialAnalysis {
                field_boundaries: vec![wheat_plot(lat, lon)],
                crop_classification: vec![CropClassification {
                    crop_type: "wheat".to_string(),
                    confidence: 0.92,
                    area: 2.5,
                    coordinates: [lon, lat],
                }],
                health_analysis: HealthAnalysis {
                    overall_health: 85,
                    stress_areas: Vec::new(),
                    recommendations: vec![
                        "Monitor soil moisture levels".to_string(),
                        "Consider irrigation if needed".to_string(),
                    ],
                },
            },
        }
    }

    pub fn field_boundaries(&self, lat: f64, lon: f64) -> Vec<FieldBoundary> {
        vec![wheat_plot(lat, lon), cotton_plot(lat, lon)]
    }
}
