//! CareMesh Matching Service
//!
//! Matches doctors seeking home-care pharmacy placement with pharmacies
//! that can accept the patient:
//! - Geospatial radius search with capability/capacity filtering and a
//!   degraded fallback path
//! - Request → response lifecycle with at-most-one-answer enforcement and
//!   atomic capacity accounting
//! - Per-route rate limiting and a bounded datastore connection pool

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod request_context;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
