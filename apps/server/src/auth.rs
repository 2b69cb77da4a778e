//! Identity extraction
//!
//! Authentication and session management live in an upstream gateway; this
//! service trusts the identity headers that gateway injects. The extractors
//! here are the narrow interface to that collaborator: a doctor or pharmacy
//! UUID, or a 401.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::Error;

pub const DOCTOR_ID_HEADER: &str = "x-doctor-id";
pub const PHARMACY_ID_HEADER: &str = "x-pharmacy-id";

/// The authenticated doctor on doctor-facing routes.
#[derive(Debug, Clone, Copy)]
pub struct DoctorIdentity(pub Uuid);

/// The authenticated pharmacy on pharmacy-facing routes.
#[derive(Debug, Clone, Copy)]
pub struct PharmacyIdentity(pub Uuid);

fn identity_header(parts: &Parts, name: &'static str) -> Result<Uuid, Error> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| Error::Unauthorized(name.to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| Error::Unauthorized(name.to_string()))?;
    Uuid::parse_str(value).map_err(|_| Error::Unauthorized(name.to_string()))
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for DoctorIdentity {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_header(parts, DOCTOR_ID_HEADER).map(DoctorIdentity)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PharmacyIdentity {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_header(parts, PHARMACY_ID_HEADER).map(PharmacyIdentity)
    }
}
