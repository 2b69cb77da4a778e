//! Pharmacy search engine
//!
//! Radius search around a validated center with capacity and capability
//! filters. Two strategies implement one contract: the primary strategy
//! pushes everything into an indexed `earthdistance` query; the fallback
//! fetches active pharmacies and applies the same rules client-side with the
//! canonical haversine distance. The engine tries primary under a bounded
//! timeout and degrades to the fallback on any engine-side failure; callers
//! see the same result shape either way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgConnection;

use caremesh_geo::{haversine_km, Coordinate};

use crate::config::SearchConfig;
use crate::db::{PgPool, PharmacyRepository};
use crate::models::{Capability, Pharmacy};
use crate::{Error, Result};

/// A validated, bounded search. Construction via [`SearchQuery::build`] is
/// the only way to obtain one, so strategies never re-check inputs.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    center: Coordinate,
    radius_km: f64,
    exclude_full: bool,
    required: Vec<Capability>,
    limit: usize,
}

impl SearchQuery {
    /// Validate raw inputs against the configured bounds.
    ///
    /// Coordinates and radius are rejected when out of range (fail fast,
    /// before any datastore work); a missing radius or limit takes the
    /// configured default, and an oversized limit is clamped to the maximum.
    pub fn build(
        center: Coordinate,
        radius_km: Option<f64>,
        exclude_full: bool,
        required: Vec<Capability>,
        limit: Option<usize>,
        config: &SearchConfig,
    ) -> Result<Self> {
        let radius_km = radius_km.unwrap_or(config.default_radius_km);
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(Error::InvalidRadius(format!(
                "radius must be positive, got {radius_km}"
            )));
        }
        if radius_km > config.max_radius_km {
            return Err(Error::InvalidRadius(format!(
                "radius {radius_km} exceeds maximum {}",
                config.max_radius_km
            )));
        }

        let limit = limit.unwrap_or(config.default_limit);
        if limit == 0 {
            return Err(Error::Validation("limit must be positive".to_string()));
        }
        let limit = limit.min(config.max_limit);

        Ok(Self {
            center,
            radius_km,
            exclude_full,
            required,
            limit,
        })
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }
}

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub pharmacy: Pharmacy,
    pub distance_km: f64,
}

#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, conn: &mut PgConnection, query: &SearchQuery)
        -> Result<Vec<SearchHit>>;
}

/// Primary path: one indexed spatial query, distance-sorted by the database.
pub struct SpatialIndexStrategy;

#[async_trait]
impl SearchStrategy for SpatialIndexStrategy {
    fn name(&self) -> &'static str {
        "spatial_index"
    }

    async fn execute(
        &self,
        conn: &mut PgConnection,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>> {
        let rows = PharmacyRepository::search_within_radius(
            conn,
            query.center,
            query.radius_km,
            query.exclude_full,
            &query.required,
            query.limit,
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                pharmacy: row.pharmacy,
                distance_km: row.distance_km,
            })
            .collect())
    }
}

/// Degraded path: fetch active pharmacies and filter/rank in memory.
pub struct LinearScanStrategy;

#[async_trait]
impl SearchStrategy for LinearScanStrategy {
    fn name(&self) -> &'static str {
        "linear_scan"
    }

    async fn execute(
        &self,
        conn: &mut PgConnection,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>> {
        let pharmacies = PharmacyRepository::fetch_active_with_coordinates(conn).await?;
        Ok(filter_and_rank(pharmacies, query))
    }
}

/// The shared filter and ranking rules, applied client-side.
///
/// Radius, then capacity (when excluding full pharmacies), then every
/// required capability; ascending by distance with a stable sort, truncated
/// to the query limit. Ties keep fetch order.
pub fn filter_and_rank(pharmacies: Vec<Pharmacy>, query: &SearchQuery) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = pharmacies
        .into_iter()
        .filter_map(|pharmacy| {
            let coordinate = pharmacy.coordinate()?;
            let distance_km = haversine_km(query.center, coordinate);
            if distance_km > query.radius_km {
                return None;
            }
            if query.exclude_full && !pharmacy.has_available_capacity() {
                return None;
            }
            if !query.required.iter().all(|c| pharmacy.has_capability(*c)) {
                return None;
            }
            Some(SearchHit {
                pharmacy,
                distance_km,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(query.limit);
    hits
}

pub struct PharmacySearchEngine {
    pool: Arc<PgPool>,
    config: SearchConfig,
    primary: SpatialIndexStrategy,
    fallback: LinearScanStrategy,
}

impl PharmacySearchEngine {
    pub fn new(pool: Arc<PgPool>, config: SearchConfig) -> Self {
        Self {
            pool,
            config,
            primary: SpatialIndexStrategy,
            fallback: LinearScanStrategy,
        }
    }

    /// Run the search, degrading to the linear scan when the primary query
    /// errors or exceeds its time budget. `SearchUnavailable` only when both
    /// paths fail.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let budget = Duration::from_millis(self.config.query_timeout_ms);

        let mut conn = self.pool.acquire().await?;
        match tokio::time::timeout(budget, self.primary.execute(&mut conn, query)).await {
            Ok(Ok(hits)) => return Ok(hits),
            Ok(Err(e)) => {
                tracing::warn!(
                    strategy = self.primary.name(),
                    error = %e,
                    "Primary search failed, falling back"
                );
            }
            Err(_) => {
                tracing::warn!(
                    strategy = self.primary.name(),
                    budget_ms = self.config.query_timeout_ms,
                    "Primary search timed out, falling back"
                );
            }
        }
        // A cancelled or failed query can leave protocol bytes in flight on
        // the connection; take it out of circulation entirely rather than
        // returning it to the pool for the next caller to trip over.
        conn.discard();

        crate::metrics::SEARCH_FALLBACK_TOTAL.inc();

        let mut conn = self.pool.acquire().await?;
        match self.fallback.execute(&mut conn, query).await {
            Ok(hits) => Ok(hits),
            Err(e) => {
                tracing::error!(
                    strategy = self.fallback.name(),
                    error = %e,
                    "Fallback search failed"
                );
                Err(Error::SearchUnavailable(
                    "both search paths failed".to_string(),
                ))
            }
        }
    }
}
