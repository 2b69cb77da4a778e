//! Pharmacy search handler
//!
//! `GET /api/pharmacies/search` — radius search around a coordinate (or a
//! geocoded address) with capability and capacity filters. Query parameters
//! are parsed from raw pairs because `services` repeats.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use caremesh_geo::Coordinate;

use crate::models::{Capability, PharmacySummary};
use crate::services::SearchQuery;
use crate::state::AppState;
use crate::{Error, Result};

/// Raw, unvalidated search parameters as they arrive on the wire.
#[derive(Debug, Default, PartialEq)]
pub struct SearchParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
    pub radius: Option<f64>,
    pub exclude_full: Option<bool>,
    pub services: Vec<Capability>,
    pub limit: Option<usize>,
}

impl SearchParams {
    /// Parse raw query pairs. Repeated `services` accumulate; repeated
    /// scalar parameters take the last value. Unknown parameter names are
    /// ignored, unknown `services` tags are not.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self> {
        let mut params = SearchParams::default();

        for (key, value) in pairs {
            match key.as_str() {
                "lat" => {
                    params.lat = Some(value.parse().map_err(|_| {
                        Error::InvalidCoordinates(format!("lat is not a number: {value}"))
                    })?);
                }
                "lng" => {
                    params.lng = Some(value.parse().map_err(|_| {
                        Error::InvalidCoordinates(format!("lng is not a number: {value}"))
                    })?);
                }
                "address" => params.address = Some(value.clone()),
                "radius" => {
                    params.radius = Some(value.parse().map_err(|_| {
                        Error::InvalidRadius(format!("radius is not a number: {value}"))
                    })?);
                }
                "exclude_full" => {
                    params.exclude_full = Some(parse_bool(value)?);
                }
                "services" => {
                    let capability = value
                        .parse::<Capability>()
                        .map_err(Error::Validation)?;
                    if !params.services.contains(&capability) {
                        params.services.push(capability);
                    }
                }
                "limit" => {
                    params.limit = Some(value.parse().map_err(|_| {
                        Error::Validation(format!("limit is not a number: {value}"))
                    })?);
                }
                _ => {}
            }
        }

        Ok(params)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::Validation(format!(
            "exclude_full must be a boolean, got {other}"
        ))),
    }
}

pub async fn search_pharmacies(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let params = SearchParams::from_pairs(&pairs)?;
    let center = resolve_center(&state, &params).await?;

    let query = SearchQuery::build(
        center,
        params.radius,
        params.exclude_full.unwrap_or(true),
        params.services,
        params.limit,
        &state.config.search,
    )?;

    let hits = state.search_engine.search(&query).await?;

    let pharmacies: Vec<PharmacySummary> = hits
        .iter()
        .map(|hit| PharmacySummary::from_pharmacy(&hit.pharmacy, hit.distance_km))
        .collect();

    let body = json!({
        "pharmacies": pharmacies,
        "total": pharmacies.len(),
        "radius": query.radius_km(),
        "center": { "lat": center.latitude(), "lng": center.longitude() },
        "generated_at": Utc::now(),
    });

    let mut response = (StatusCode::OK, Json(body)).into_response();

    // Results drift slowly; allow short-lived client/edge caching.
    let max_age = state.config.search.cache_max_age_seconds;
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={max_age}")) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }

    Ok(response)
}

/// Coordinates when given; otherwise geocode the address through the
/// external collaborator.
async fn resolve_center(state: &AppState, params: &SearchParams) -> Result<Coordinate> {
    match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => Ok(Coordinate::new(lat, lng)?),
        (Some(_), None) | (None, Some(_)) => Err(Error::InvalidCoordinates(
            "lat and lng must be provided together".to_string(),
        )),
        (None, None) => {
            let address = params.address.as_deref().ok_or_else(|| {
                Error::InvalidCoordinates("lat/lng or address is required".to_string())
            })?;
            state
                .geocoder
                .geocode(address)
                .await?
                .ok_or_else(|| Error::AddressNotFound(address.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_full_parameter_set() {
        let params = SearchParams::from_pairs(&pairs(&[
            ("lat", "35.6812"),
            ("lng", "139.7671"),
            ("radius", "10"),
            ("exclude_full", "false"),
            ("services", "narcotics"),
            ("services", "clean_room"),
            ("limit", "20"),
        ]))
        .unwrap();

        assert_eq!(params.lat, Some(35.6812));
        assert_eq!(params.lng, Some(139.7671));
        assert_eq!(params.radius, Some(10.0));
        assert_eq!(params.exclude_full, Some(false));
        assert_eq!(
            params.services,
            vec![Capability::Narcotics, Capability::CleanRoom]
        );
        assert_eq!(params.limit, Some(20));
    }

    #[test]
    fn non_numeric_coordinates_fail_with_coordinate_error() {
        let err = SearchParams::from_pairs(&pairs(&[("lat", "north")])).unwrap_err();
        assert!(matches!(err, Error::InvalidCoordinates(_)));
    }

    #[test]
    fn non_numeric_radius_fails_with_radius_error() {
        let err = SearchParams::from_pairs(&pairs(&[("radius", "wide")])).unwrap_err();
        assert!(matches!(err, Error::InvalidRadius(_)));
    }

    #[test]
    fn unknown_service_tag_is_rejected() {
        let err = SearchParams::from_pairs(&pairs(&[("services", "24h")])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn duplicate_service_tags_collapse() {
        let params = SearchParams::from_pairs(&pairs(&[
            ("services", "narcotics"),
            ("services", "narcotics"),
        ]))
        .unwrap();
        assert_eq!(params.services, vec![Capability::Narcotics]);
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let params = SearchParams::from_pairs(&pairs(&[("page", "3")])).unwrap();
        assert_eq!(params, SearchParams::default());
    }

    #[test]
    fn last_scalar_value_wins() {
        let params =
            SearchParams::from_pairs(&pairs(&[("radius", "5"), ("radius", "12")])).unwrap();
        assert_eq!(params.radius, Some(12.0));
    }
}
