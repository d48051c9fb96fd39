//! Presentation surface the orchestrator drives.

use crate::types::WeatherSnapshot;

/// What the widget is currently showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayState {
    #[default]
    Idle,
    Loading,
    Displaying,
    /// Cached data shown after a failed fetch
    DisplayingWithWarning,
    ErrorNoData,
    /// Connectivity lost; whatever was shown stays, with a warning
    Offline,
}

/// Renders weather into some surface. Implementations only assign fields;
/// all decisions are made by the caller.
pub trait WeatherDisplay: Send + Sync {
    /// Show or hide the loading indicator and dim existing content
    fn set_loading(&self, loading: bool);

    fn show_weather(&self, snapshot: &WeatherSnapshot, location_label: &str);

    /// Non-blocking notice shown alongside current content
    fn show_warning(&self, message: &str);

    fn show_error(&self, message: &str);
}
