//! Cache key conventions.
//!
//! Keys only collide for semantically identical requests: coordinates are
//! rounded to 4 decimal places and parameter lists are sorted by name.

use std::collections::BTreeMap;
use std::fmt::Display;

pub fn weather_key(lat: f64, lon: f64) -> String {
    format!("weather:{lat:.4}:{lon:.4}")
}

pub fn forecast_key(lat: f64, lon: f64) -> String {
    format!("forecast:{}", weather_key(lat, lon))
}

pub fn alerts_key(lat: f64, lon: f64) -> String {
    format!("alerts:{}", weather_key(lat, lon))
}

pub fn satellite_key(lat: f64, lon: f64) -> String {
    format!("satellite:{lat:.4}:{lon:.4}")
}

/// Key for an AI completion. The order in which `params` are given does not matter.
pub fn ai_key<'a, I, V>(kind: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Display,
{
    composite_key(&format!("ai:{kind}"), params)
}

/// `prefix:name:value:name:value...` with names in sorted order.
pub fn composite_key<'a, I, V>(prefix: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Display,
{
    let sorted: BTreeMap<&str, String> = params
        .into_iter()
        .map(|(name, value)| (name, value.to_string()))
        .collect();

    let mut key = String::from(prefix);
    for (name, value) in sorted {
        key.push(':');
        key.push_str(name);
        key.push(':');
        key.push_str(&value);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_key_rounds_to_four_places() {
        assert_eq!(weather_key(18.52041234, 73.85669999), "weather:18.5204:73.8567");
        assert_eq!(weather_key(18.5204, 73.8567), "weather:18.5204:73.8567");
        assert_eq!(weather_key(-3.0, 0.0), "weather:-3.0000:0.0000");
    }

    #[test]
    fn derived_weather_keys() {
        assert_eq!(forecast_key(18.5204, 73.8567), "forecast:weather:18.5204:73.8567");
        assert_eq!(alerts_key(1.0, 2.0), "alerts:weather:1.0000:2.0000");
        assert_eq!(satellite_key(18.52041, 73.85669), "satellite:18.5204:73.8567");
    }

    #[test]
    fn ai_key_is_order_independent() {
        let a = ai_key("crops", [("season", "rabi"), ("climate", "dry"), ("soilType", "black")]);
        let b = ai_key("crops", [("soilType", "black"), ("season", "rabi"), ("climate", "dry")]);
        assert_eq!(a, b);
        assert_eq!(a, "ai:crops:climate:dry:season:rabi:soilType:black");
    }

    #[test]
    fn composite_key_without_params() {
        let params: [(&str, &str); 0] = [];
        assert_eq!(composite_key("agmarknet", params), "agmarknet");
    }
}
