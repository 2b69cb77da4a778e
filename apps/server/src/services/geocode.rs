//! Geocoder adapter
//!
//! Address-to-coordinate resolution is an external collaborator consumed
//! through a narrow interface: an address either resolves to a coordinate
//! pair or it doesn't. Callers that already have coordinates never touch
//! this.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use caremesh_geo::Coordinate;

use crate::config::GeocoderConfig;
use crate::{Error, Result};

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-text address. `Ok(None)` means the collaborator
    /// answered "not found"; transport failures are errors.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>>;
}

/// HTTP geocoding collaborator. Expects `GET {endpoint}?address=...` to
/// answer `{"lat": .., "lng": ..}` or 404.
pub struct HttpGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct GeocodeBody {
    lat: f64,
    lng: f64,
}

impl HttpGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build geocoder client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address)])
            .send()
            .await
            .map_err(|e| Error::Geocode(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| Error::Geocode(e.to_string()))?;

        let body: GeocodeBody = response
            .json()
            .await
            .map_err(|e| Error::Geocode(format!("malformed geocoder response: {e}")))?;

        let coordinate = Coordinate::new(body.lat, body.lng)
            .map_err(|e| Error::Geocode(format!("geocoder returned {e}")))?;

        Ok(Some(coordinate))
    }
}

/// Used when no geocoding endpoint is configured: address-based search is
/// simply unavailable.
pub struct NullGeocoder;

#[async_trait]
impl Geocoder for NullGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Option<Coordinate>> {
        Err(Error::Geocode("no geocoding endpoint configured".to_string()))
    }
}
