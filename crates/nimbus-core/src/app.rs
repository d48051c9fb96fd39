use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{AppError, Config};

/// Application state and lifecycle manager
pub struct App {
    config: Arc<Config>,
}

impl App {
    /// Create a new application instance from the default or given config file
    pub fn new(config_path: Option<&Path>) -> Result<Self, AppError> {
        let (config, validation) = Config::load_validated(config_path)?;
        tracing::info!(
            "Configuration loaded ({} warnings)",
            validation.warnings.len()
        );

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Directory where persistent state (the weather snapshot) lives
    pub fn data_dir(&self) -> PathBuf {
        self.config.config_dir.clone()
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown the application
    pub fn shutdown(&self) {
        tracing::info!("Shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_config_in_given_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let app = App::new(Some(&path)).unwrap();

        assert_eq!(app.data_dir(), dir.path());
        assert!(path.exists());
    }

    #[test]
    fn test_new_surfaces_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[location]\ndefault_latitude = 123.0\n").unwrap();

        let err = App::new(Some(&path)).err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}
