//! Reverse geocoding: convert coordinates to human-readable place names.
//! Uses Nominatim (OpenStreetMap) by default - free, no API key required.

use async_trait::async_trait;
use nimbus_core::{NetworkError, ReqwestErrorExt};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::types::Coordinates;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("Nimbus/", env!("CARGO_PKG_VERSION"));

/// Display name for a coordinate pair. Never fails.
#[async_trait]
pub trait PlaceNamer: Send + Sync {
    async fn name_for(&self, coords: Coordinates) -> String;
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// "<place>, <country>", or just the place when the country is missing
    /// or identical
    fn label(self) -> Option<String> {
        let country = self.country.filter(|c| !c.trim().is_empty());

        let place = self
            .city
            .or(self.town)
            .or(self.village)
            .or(self.municipality)
            .or(self.county)
            .or(self.state)
            .filter(|p| !p.trim().is_empty());

        match (place, country) {
            (Some(place), Some(country)) if place != country => {
                Some(format!("{}, {}", place, country))
            }
            (Some(place), _) => Some(place),
            (None, country) => country,
        }
    }
}

pub struct ReverseGeocoder {
    client: Client,
    url: String,
    default_coords: Coordinates,
    default_label: String,
}

impl ReverseGeocoder {
    pub fn new(
        url: impl Into<String>,
        default_coords: Coordinates,
        default_label: impl Into<String>,
    ) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ReqwestErrorExt::into_network_error)?;

        Ok(Self {
            client,
            url: url.into(),
            default_coords,
            default_label: default_label.into(),
        })
    }

    async fn lookup(&self, coords: Coordinates) -> Result<Option<String>, NetworkError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        if !response.status().is_success() {
            return Err(NetworkError::ServerError {
                status: response.status().as_u16(),
                message: "reverse geocode failed".to_string(),
            });
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        Ok(body.address.and_then(NominatimAddress::label))
    }
}

#[async_trait]
impl PlaceNamer for ReverseGeocoder {
    async fn name_for(&self, coords: Coordinates) -> String {
        if coords == self.default_coords {
            return self.default_label.clone();
        }

        match self.lookup(coords).await {
            Ok(Some(name)) => {
                tracing::info!("Reverse geocoded to: {}", name);
                name
            }
            Ok(None) => {
                tracing::debug!("Reverse geocode returned no place for {}", coords);
                self.default_label.clone()
            }
            Err(e) => {
                tracing::debug!("Reverse geocode failed: {}", e);
                self.default_label.clone()
            }
        }
    }
}
