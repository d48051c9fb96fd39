//! Open-Meteo current-conditions fetcher.

use async_trait::async_trait;
use nimbus_core::{ReqwestErrorExt, TemperatureUnit};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::types::{Coordinates, WeatherError, WeatherSnapshot};

const CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
                              precipitation,weather_code,wind_speed_10m";

/// Performs one remote request for the given coordinates. No retries, no
/// caching.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    async fn fetch(&self, coords: Coordinates) -> Result<WeatherSnapshot, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    current: Option<CurrentData>,
    current_units: Option<CurrentUnits>,
}

#[derive(Debug, Deserialize)]
struct CurrentData {
    time: String,
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    precipitation: f64,
    weather_code: i32,
    wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentUnits {
    temperature_2m: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    base_url: String,
    unit: TemperatureUnit,
}

impl WeatherProvider {
    pub fn new(
        base_url: impl Into<String>,
        unit: TemperatureUnit,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            unit,
        })
    }

    fn unit_param(&self) -> &'static str {
        let locale = std::env::var("LANG").ok();
        if resolve_unit(self.unit, locale.as_deref()) == TemperatureUnit::Fahrenheit {
            "fahrenheit"
        } else {
            "celsius"
        }
    }

    fn parse(body: &str, requested_unit: &str) -> Result<WeatherSnapshot, WeatherError> {
        let response: ApiResponse =
            serde_json::from_str(body).map_err(|e| WeatherError::Parse(e.to_string()))?;

        let current = response
            .current
            .ok_or_else(|| WeatherError::Parse("response has no current conditions".into()))?;

        let temperature_unit = response
            .current_units
            .and_then(|u| u.temperature_2m)
            .unwrap_or_else(|| {
                if requested_unit == "fahrenheit" {
                    "°F".to_string()
                } else {
                    "°C".to_string()
                }
            });

        Ok(WeatherSnapshot {
            temperature: current.temperature_2m,
            apparent_temperature: current.apparent_temperature,
            humidity: current.relative_humidity_2m.round().clamp(0.0, 100.0) as u8,
            wind_speed: current.wind_speed_10m,
            precipitation: current.precipitation,
            weather_code: current.weather_code,
            temperature_unit,
            observed_at: current.time,
        })
    }
}

/// Pick a concrete unit. `Auto` follows the locale: Fahrenheit for the
/// regions that use it, Celsius everywhere else.
pub fn resolve_unit(unit: TemperatureUnit, locale: Option<&str>) -> TemperatureUnit {
    match unit {
        TemperatureUnit::Auto => {
            let region = locale
                .and_then(|l| l.split('.').next())
                .and_then(|l| l.split('_').nth(1))
                .unwrap_or_default();
            if matches!(region, "US" | "LR" | "MM" | "BS" | "BZ" | "KY" | "PW") {
                TemperatureUnit::Fahrenheit
            } else {
                TemperatureUnit::Celsius
            }
        }
        other => other,
    }
}

#[async_trait]
impl WeatherFetcher for WeatherProvider {
    async fn fetch(&self, coords: Coordinates) -> Result<WeatherSnapshot, WeatherError> {
        let unit = self.unit_param();
        let url = format!("{}/forecast", self.base_url);

        tracing::debug!("Fetching weather for {} ({})", coords, unit);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", coords.latitude.to_string()),
                ("longitude", coords.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("temperature_unit", unit.to_string()),
                ("wind_speed_unit", "kmh".to_string()),
                ("precipitation_unit", "mm".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Self::parse(&body, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let body = r#"{
            "current_units": { "temperature_2m": "°C" },
            "current": {
                "time": "2026-10-19T12:00",
                "temperature_2m": 11.4,
                "apparent_temperature": 9.8,
                "relative_humidity_2m": 71,
                "precipitation": 0.2,
                "weather_code": 61,
                "wind_speed_10m": 14.3
            }
        }"#;

        let snapshot = WeatherProvider::parse(body, "celsius").unwrap();
        assert_eq!(snapshot.temperature, 11.4);
        assert_eq!(snapshot.humidity, 71);
        assert_eq!(snapshot.weather_code, 61);
        assert_eq!(snapshot.temperature_unit, "°C");
        assert_eq!(snapshot.observed_at, "2026-10-19T12:00");
    }

    #[test]
    fn test_parse_missing_current_is_parse_failure() {
        let err = WeatherProvider::parse(r#"{"latitude": 1.0}"#, "celsius").unwrap_err();
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_parse_garbage_is_parse_failure() {
        let err = WeatherProvider::parse("<html>oops</html>", "celsius").unwrap_err();
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_parse_defaults_unit_symbol_from_request() {
        let body = r#"{
            "current": {
                "time": "2026-10-19T12:00",
                "temperature_2m": 52.0,
                "apparent_temperature": 50.0,
                "relative_humidity_2m": 40,
                "precipitation": 0.0,
                "weather_code": 0,
                "wind_speed_10m": 3.0
            }
        }"#;
        let snapshot = WeatherProvider::parse(body, "fahrenheit").unwrap();
        assert_eq!(snapshot.temperature_unit, "°F");
    }

    #[test]
    fn test_resolve_unit() {
        assert_eq!(
            resolve_unit(TemperatureUnit::Auto, Some("en_US.UTF-8")),
            TemperatureUnit::Fahrenheit
        );
        assert_eq!(
            resolve_unit(TemperatureUnit::Auto, Some("de_DE.UTF-8")),
            TemperatureUnit::Celsius
        );
        assert_eq!(resolve_unit(TemperatureUnit::Auto, None), TemperatureUnit::Celsius);
        assert_eq!(
            resolve_unit(TemperatureUnit::Celsius, Some("en_US.UTF-8")),
            TemperatureUnit::Celsius
        );
    }
}
