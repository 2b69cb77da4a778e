//! Domain services - search engine, request lifecycle, geocoding

pub mod geocode;
pub mod lifecycle;
pub mod search;

pub use geocode::{Geocoder, HttpGeocoder, NullGeocoder};
pub use lifecycle::RequestLifecycle;
pub use search::{PharmacySearchEngine, SearchHit, SearchQuery};
