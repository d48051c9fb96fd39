//! Plain stdout rendering of the weather widget.

use std::sync::atomic::{AtomicBool, Ordering};

use nimbus_weather::{WeatherDisplay, WeatherSnapshot};

#[derive(Debug, Default)]
pub struct TerminalDisplay {
    loading: AtomicBool,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Render one snapshot as the lines printed to the terminal
pub fn format_weather(snapshot: &WeatherSnapshot, location_label: &str) -> String {
    let condition = snapshot.condition();
    let unit = &snapshot.temperature_unit;
    format!(
        "{label} | {description} [{icon}]\n  \
         {temp:.1}{unit} (feels like {feels:.1}{unit})\n  \
         Humidity {humidity}%  Wind {wind:.1} km/h  Precipitation {precip:.1} mm\n  \
         Observed {observed}",
        label = location_label,
        description = condition.description(),
        icon = condition.icon_name(),
        temp = snapshot.temperature,
        feels = snapshot.apparent_temperature,
        humidity = snapshot.humidity,
        wind = snapshot.wind_speed,
        precip = snapshot.precipitation,
        observed = snapshot.observed_at,
    )
}

impl WeatherDisplay for TerminalDisplay {
    fn set_loading(&self, loading: bool) {
        let was_loading = self.loading.swap(loading, Ordering::SeqCst);
        if loading && !was_loading {
            println!("Loading weather...");
        }
    }

    fn show_weather(&self, snapshot: &WeatherSnapshot, location_label: &str) {
        println!("{}", format_weather(snapshot, location_label));
    }

    fn show_warning(&self, message: &str) {
        println!("! {}", message);
    }

    fn show_error(&self, message: &str) {
        println!("x {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_weather() {
        let snapshot = WeatherSnapshot {
            temperature: 12.34,
            apparent_temperature: 10.0,
            humidity: 68,
            wind_speed: 15.8,
            precipitation: 0.0,
            weather_code: 0,
            temperature_unit: "°C".to_string(),
            observed_at: "2026-10-19T14:15".to_string(),
        };

        let text = format_weather(&snapshot, "Berlin, Germany");

        assert!(text.starts_with("Berlin, Germany | Clear sky [sun]"));
        assert!(text.contains("12.3°C (feels like 10.0°C)"));
        assert!(text.contains("Humidity 68%"));
        assert!(text.contains("Observed 2026-10-19T14:15"));
    }

    #[test]
    fn test_unknown_code_renders_default_label() {
        let snapshot = WeatherSnapshot {
            temperature: 1.0,
            apparent_temperature: 1.0,
            humidity: 0,
            wind_speed: 0.0,
            precipitation: 0.0,
            weather_code: 42,
            temperature_unit: "°F".to_string(),
            observed_at: String::new(),
        };
        assert!(format_weather(&snapshot, "X").contains("Unknown [cloud_question]"));
    }
}
