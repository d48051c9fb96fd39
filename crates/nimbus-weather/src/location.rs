//! Live location lookup with a bounded wait and a fixed fallback.

use async_trait::async_trait;
use nimbus_core::ReqwestErrorExt;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{Coordinates, LocationError};

pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_millis(5000);

/// A capability that may report the device's coordinates
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn locate(&self) -> Result<Coordinates, LocationError>;
}

/// No location capability on this host
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocationSource;

#[async_trait]
impl LocationSource for NoLocationSource {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

/// Always reports the same coordinates (e.g. from the command line)
#[derive(Debug, Clone, Copy)]
pub struct StaticLocationSource(pub Coordinates);

#[async_trait]
impl LocationSource for StaticLocationSource {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

/// IP-based geolocation (ip-api.com response shape)
#[derive(Debug, Clone)]
pub struct IpLocationSource {
    client: Client,
    url: String,
}

impl IpLocationSource {
    pub fn new(url: impl Into<String>) -> Result<Self, LocationError> {
        let client = Client::builder()
            .timeout(DEFAULT_LOCATION_TIMEOUT)
            .build()
            .map_err(|e| LocationError::Other(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LocationSource for IpLocationSource {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LocationError::Other(e.into_network_error().to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::Other(format!(
                "IP lookup returned status {}",
                response.status()
            )));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Other(e.to_string()))?;

        if body.status != "success" {
            tracing::debug!(
                "IP lookup refused: {}",
                body.message.as_deref().unwrap_or("no reason given")
            );
            return Err(LocationError::PermissionDenied);
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(LocationError::Other("IP lookup missing coordinates".into())),
        }
    }
}

/// Resolves coordinates for a fetch. Never fails: denial, timeout, absent
/// capability, or out-of-range coordinates all yield the default.
///
/// Nothing is cached; every call asks the source again.
#[derive(Clone)]
pub struct LocationResolver {
    source: Arc<dyn LocationSource>,
    default: Coordinates,
    timeout: Duration,
}

impl LocationResolver {
    pub fn new(source: Arc<dyn LocationSource>, default: Coordinates, timeout: Duration) -> Self {
        Self {
            source,
            default,
            timeout,
        }
    }

    pub async fn resolve(&self) -> Coordinates {
        let result = match tokio::time::timeout(self.timeout, self.source.locate()).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };

        match result {
            Ok(coords) if coords.is_valid() => {
                tracing::info!("Got location: {}", coords);
                coords
            }
            Ok(coords) => {
                tracing::warn!("Ignoring invalid location {}, using default", coords);
                self.default
            }
            Err(e) => {
                tracing::warn!("{}; using default location {}", e, self.default);
                self.default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DeniedSource;

    #[async_trait]
    impl LocationSource for DeniedSource {
        async fn locate(&self) -> Result<Coordinates, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    struct HangingSource;

    #[async_trait]
    impl LocationSource for HangingSource {
        async fn locate(&self) -> Result<Coordinates, LocationError> {
            std::future::pending::<()>().await;
            Err(LocationError::Other("unreachable".into()))
        }
    }

    fn berlin() -> Coordinates {
        Coordinates::new(52.52, 13.405)
    }

    #[tokio::test]
    async fn test_resolve_uses_live_location() {
        let seattle = Coordinates::new(47.6062, -122.3321);
        let resolver = LocationResolver::new(
            Arc::new(StaticLocationSource(seattle)),
            berlin(),
            DEFAULT_LOCATION_TIMEOUT,
        );
        assert_eq!(resolver.resolve().await, seattle);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_denial() {
        let resolver =
            LocationResolver::new(Arc::new(DeniedSource), berlin(), DEFAULT_LOCATION_TIMEOUT);
        assert_eq!(resolver.resolve().await, berlin());
    }

    #[tokio::test]
    async fn test_resolve_falls_back_without_capability() {
        let resolver =
            LocationResolver::new(Arc::new(NoLocationSource), berlin(), DEFAULT_LOCATION_TIMEOUT);
        assert_eq!(resolver.resolve().await, berlin());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_falls_back_on_timeout() {
        let resolver =
            LocationResolver::new(Arc::new(HangingSource), berlin(), DEFAULT_LOCATION_TIMEOUT);
        let started = tokio::time::Instant::now();

        assert_eq!(resolver.resolve().await, berlin());
        assert!(started.elapsed() >= DEFAULT_LOCATION_TIMEOUT);
    }

    #[tokio::test]
    async fn test_resolve_rejects_out_of_range_coordinates() {
        let resolver = LocationResolver::new(
            Arc::new(StaticLocationSource(Coordinates::new(200.0, 0.0))),
            berlin(),
            DEFAULT_LOCATION_TIMEOUT,
        );
        assert_eq!(resolver.resolve().await, berlin());
    }
}
