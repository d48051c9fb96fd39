use nimbus_core::NetworkError;
use serde::{Deserialize, Serialize};

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    ClearSky,
    MainlyClear,
    PartlyCloudy,
    Overcast,
    Fog,
    Drizzle,
    FreezingDrizzle,
    Rain,
    FreezingRain,
    Snow,
    SnowGrains,
    RainShowers,
    SnowShowers,
    Thunderstorm,
    ThunderstormWithHail,
    Unknown,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::ClearSky,
            1 => Self::MainlyClear,
            2 => Self::PartlyCloudy,
            3 => Self::Overcast,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 => Self::FreezingDrizzle,
            61 | 63 | 65 => Self::Rain,
            66 | 67 => Self::FreezingRain,
            71 | 73 | 75 => Self::Snow,
            77 => Self::SnowGrains,
            80..=82 => Self::RainShowers,
            85 | 86 => Self::SnowShowers,
            95 => Self::Thunderstorm,
            96 | 99 => Self::ThunderstormWithHail,
            _ => Self::Unknown,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::ClearSky => "Clear sky",
            Self::MainlyClear => "Mainly clear",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Overcast => "Overcast",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::FreezingDrizzle => "Freezing drizzle",
            Self::Rain => "Rain",
            Self::FreezingRain => "Freezing rain",
            Self::Snow => "Snow",
            Self::SnowGrains => "Snow grains",
            Self::RainShowers => "Rain showers",
            Self::SnowShowers => "Snow showers",
            Self::Thunderstorm => "Thunderstorm",
            Self::ThunderstormWithHail => "Thunderstorm with hail",
            Self::Unknown => "Unknown",
        }
    }

    /// Get icon name
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::ClearSky => "sun",
            Self::MainlyClear | Self::PartlyCloudy => "cloud_sun",
            Self::Overcast => "cloud",
            Self::Fog => "cloud_fog",
            Self::Drizzle | Self::Rain | Self::RainShowers => "cloud_rain",
            Self::FreezingDrizzle | Self::FreezingRain => "cloud_sleet",
            Self::Snow | Self::SnowGrains | Self::SnowShowers => "cloud_snow",
            Self::Thunderstorm | Self::ThunderstormWithHail => "cloud_lightning",
            Self::Unknown => "cloud_question",
        }
    }
}

impl std::fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}, {:.2}", self.latitude, self.longitude)
    }
}

/// Current conditions for one location at one point in time.
///
/// Passed through the refresh pipeline unchanged; only the display reads
/// individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub weather_code: i32,
    /// Unit symbol the temperatures were fetched in, e.g. "°C"
    pub temperature_unit: String,
    /// Observation time as reported by the API (local ISO 8601)
    pub observed_at: String,
}

impl WeatherSnapshot {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.weather_code)
    }
}

/// Location service errors. Never surfaced; the resolver masks them with
/// the default location.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Weather API returned status {0}")]
    Status(u16),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl WeatherError {
    /// True for malformed or structurally empty responses
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::Status(status) if *status >= 500 => {
                "The weather service is experiencing issues. Please try again later."
            }
            Self::Status(_) => "The weather request failed. Please try again.",
            Self::Parse(_) => "Received unexpected weather data. Please try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wmo_code_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::ClearSky);
        assert_eq!(WeatherCondition::from_wmo_code(0).description(), "Clear sky");
    }

    #[test]
    fn test_wmo_code_clouds() {
        assert_eq!(WeatherCondition::from_wmo_code(1), WeatherCondition::MainlyClear);
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_wmo_code(3), WeatherCondition::Overcast);
    }

    #[test]
    fn test_wmo_code_fog() {
        assert_eq!(WeatherCondition::from_wmo_code(45), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_wmo_code(48), WeatherCondition::Fog);
    }

    #[test]
    fn test_wmo_code_precipitation() {
        assert_eq!(WeatherCondition::from_wmo_code(53), WeatherCondition::Drizzle);
        assert_eq!(WeatherCondition::from_wmo_code(57), WeatherCondition::FreezingDrizzle);
        assert_eq!(WeatherCondition::from_wmo_code(65), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(66), WeatherCondition::FreezingRain);
        assert_eq!(WeatherCondition::from_wmo_code(81), WeatherCondition::RainShowers);
    }

    #[test]
    fn test_wmo_code_snow() {
        assert_eq!(WeatherCondition::from_wmo_code(71), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_wmo_code(77), WeatherCondition::SnowGrains);
        assert_eq!(WeatherCondition::from_wmo_code(86), WeatherCondition::SnowShowers);
    }

    #[test]
    fn test_wmo_code_thunderstorm() {
        assert_eq!(WeatherCondition::from_wmo_code(95), WeatherCondition::Thunderstorm);
        assert_eq!(
            WeatherCondition::from_wmo_code(99),
            WeatherCondition::ThunderstormWithHail
        );
    }

    #[test]
    fn test_unknown_codes_map_to_default_label_and_icon() {
        let known = [
            0, 1, 2, 3, 45, 48, 51, 53, 55, 56, 57, 61, 63, 65, 66, 67, 71, 73, 75, 77, 80, 81,
            82, 85, 86, 95, 96, 99,
        ];
        for code in -5..=120 {
            let condition = WeatherCondition::from_wmo_code(code);
            if known.contains(&code) {
                assert_ne!(condition, WeatherCondition::Unknown, "code {code}");
            } else {
                assert_eq!(condition.description(), "Unknown", "code {code}");
                assert_eq!(condition.icon_name(), "cloud_question", "code {code}");
            }
        }
        assert_eq!(WeatherCondition::from_wmo_code(i32::MAX), WeatherCondition::Unknown);
    }

    #[test]
    fn test_condition_icon_name() {
        assert_eq!(WeatherCondition::ClearSky.icon_name(), "sun");
        assert_eq!(WeatherCondition::Rain.icon_name(), "cloud_rain");
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(52.52, 13.405).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_weather_error_user_message() {
        assert!(WeatherError::Status(503).user_message().contains("later"));
        assert!(WeatherError::Parse("empty".into()).is_parse_failure());
        assert!(!WeatherError::Status(404).is_parse_failure());
        assert!(WeatherError::Network(NetworkError::Timeout)
            .user_message()
            .contains("timed out"));
    }
}
