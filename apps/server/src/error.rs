//! Error types for the matching service

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid radius: {0}")]
    InvalidRadius(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("Geocoding failed: {0}")]
    Geocode(String),

    #[error("Missing or invalid identity header: {0}")]
    Unauthorized(String),

    #[error("Pharmacy {0} is not available for requests")]
    PharmacyUnavailable(uuid::Uuid),

    #[error("Request not found: {0}")]
    RequestNotFound(uuid::Uuid),

    #[error("Pharmacy {pharmacy_id} may not respond to request {request_id}")]
    Forbidden {
        request_id: uuid::Uuid,
        pharmacy_id: uuid::Uuid,
    },

    #[error("Request {0} has already been responded to")]
    AlreadyResponded(uuid::Uuid),

    #[error("Pharmacy {0} is at maximum capacity")]
    CapacityExceeded(uuid::Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded for {route}")]
    RateLimited {
        route: String,
        limit: u32,
        retry_after_secs: u64,
        reset_at: DateTime<Utc>,
    },

    #[error("Connection pool exhausted: no connection available within {0:?}")]
    PoolTimeout(std::time::Duration),

    #[error("Connection pool is shut down")]
    PoolClosed,

    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Machine-readable wire code for each error variant.
impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCoordinates(_) => "INVALID_COORDINATES",
            Error::InvalidRadius(_) => "INVALID_RADIUS",
            Error::Validation(_) => "VALIDATION",
            Error::AddressNotFound(_) => "ADDRESS_NOT_FOUND",
            Error::Geocode(_) => "GEOCODE_FAILED",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::PharmacyUnavailable(_) => "PHARMACY_UNAVAILABLE",
            Error::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            Error::Forbidden { .. } => "FORBIDDEN",
            Error::AlreadyResponded(_) => "ALREADY_RESPONDED",
            Error::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::PoolTimeout(_) | Error::PoolClosed => "POOL_EXHAUSTED",
            Error::SearchUnavailable(_) => "SEARCH_FAILED",
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::InvalidCoordinates(_)
            | Error::InvalidRadius(_)
            | Error::Validation(_)
            | Error::AddressNotFound(_)
            | Error::Geocode(_)
            | Error::PharmacyUnavailable(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::RequestNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyResponded(_) | Error::CapacityExceeded(_) => StatusCode::CONFLICT,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::PoolTimeout(_) | Error::PoolClosed => StatusCode::SERVICE_UNAVAILABLE,
            Error::SearchUnavailable(_)
            | Error::Database(_)
            | Error::Internal(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // 5xx details stay out of the response body; an opaque incident id
        // lets support correlate with server logs.
        let body = if status.is_server_error() {
            let incident_id = uuid::Uuid::new_v4().to_string();
            tracing::error!(incident_id = %incident_id, error = %self, "Request failed");
            let message = match &self {
                Error::SearchUnavailable(_) => "Search is temporarily unavailable".to_string(),
                _ => "Internal server error".to_string(),
            };
            json!({ "code": code, "message": message, "incident_id": incident_id })
        } else {
            json!({ "code": code, "message": self.to_string() })
        };

        let mut response = (status, Json(body)).into_response();

        if let Error::RateLimited {
            limit,
            retry_after_secs,
            reset_at,
            ..
        } = &self
        {
            let headers = response.headers_mut();
            insert_header(headers, "x-ratelimit-limit", limit.to_string());
            insert_header(headers, "x-ratelimit-remaining", "0".to_string());
            insert_header(headers, "x-ratelimit-reset", reset_at.timestamp().to_string());
            insert_header(headers, "retry-after", retry_after_secs.to_string());
        }

        if matches!(self, Error::PoolTimeout(_)) {
            insert_header(response.headers_mut(), "retry-after", "1".to_string());
        }

        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );

        response
    }
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}

impl From<caremesh_geo::GeoError> for Error {
    fn from(err: caremesh_geo::GeoError) -> Self {
        Error::InvalidCoordinates(err.to_string())
    }
}
