//! Coordinate validation and great-circle distance.
//!
//! Shared by the pharmacy search engine (fallback path) and its tests. The
//! primary search path computes distances inside the database; this crate is
//! the single client-side source of truth when that path is unavailable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean earth radius in kilometers (IUGG R1).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("latitude {0} out of range [-90, 90]")]
    InvalidLatitude(f64),

    #[error("longitude {0} out of range [-180, 180]")]
    InvalidLongitude(f64),
}

/// A validated WGS84 coordinate pair.
///
/// Construction via [`Coordinate::new`] is the only way to obtain one, so any
/// `Coordinate` held downstream is already range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GeoError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        RawCoordinate {
            lat: c.latitude,
            lng: c.longitude,
        }
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Great-circle distance between two coordinates, in kilometers.
///
/// Haversine formula over a spherical earth. Accurate to ~0.5% against the
/// ellipsoid, which is more than enough for radius filtering.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
