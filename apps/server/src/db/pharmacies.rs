//! Pharmacy queries
//!
//! Two read paths exist for radius search: the indexed `earthdistance` query
//! (primary) and a plain fetch of active pharmacies for the client-side scan
//! (fallback). Capacity is mutated here only through the guarded increment
//! used by the request lifecycle transaction.

use sqlx::postgres::PgConnection;
use uuid::Uuid;

use caremesh_geo::Coordinate;

use crate::models::{Capability, Pharmacy};
use crate::{Error, Result};

/// A pharmacy row with the database-computed distance from the search
/// center, in kilometers.
#[derive(Debug, sqlx::FromRow)]
pub struct PharmacyWithDistance {
    #[sqlx(flatten)]
    pub pharmacy: Pharmacy,
    pub distance_km: f64,
}

pub struct PharmacyRepository;

impl PharmacyRepository {
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Pharmacy>> {
        let pharmacy = sqlx::query_as::<_, Pharmacy>(
            "SELECT * FROM pharmacies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(Error::Database)?;

        Ok(pharmacy)
    }

    /// Primary spatial query: distance-sorted radius search with status,
    /// capacity, and capability filters pushed down. Distances come from
    /// `earth_distance` and are authoritative for this path.
    pub async fn search_within_radius(
        conn: &mut PgConnection,
        center: Coordinate,
        radius_km: f64,
        exclude_full: bool,
        required: &[Capability],
        limit: usize,
    ) -> Result<Vec<PharmacyWithDistance>> {
        let radius_m = radius_km * 1000.0;

        let rows = sqlx::query_as::<_, PharmacyWithDistance>(
            r#"
            SELECT
                p.*,
                earth_distance(
                    ll_to_earth($1, $2),
                    ll_to_earth(p.latitude, p.longitude)
                ) / 1000.0 AS distance_km
            FROM pharmacies p
            WHERE p.status = 'active'
              AND p.latitude IS NOT NULL
              AND p.longitude IS NOT NULL
              AND earth_box(ll_to_earth($1, $2), $3)
                  @> ll_to_earth(p.latitude, p.longitude)
              AND earth_distance(
                    ll_to_earth($1, $2),
                    ll_to_earth(p.latitude, p.longitude)
                  ) <= $3
              AND (NOT $4 OR p.current_capacity < p.max_capacity)
              AND (NOT $5 OR p.twenty_four_support)
              AND (NOT $6 OR p.holiday_support)
              AND (NOT $7 OR p.emergency_support)
              AND (NOT $8 OR p.has_clean_room)
              AND (NOT $9 OR p.handles_narcotics)
            ORDER BY distance_km ASC
            LIMIT $10
            "#,
        )
        .bind(center.latitude())
        .bind(center.longitude())
        .bind(radius_m)
        .bind(exclude_full)
        .bind(required.contains(&Capability::TwentyFour))
        .bind(required.contains(&Capability::Holiday))
        .bind(required.contains(&Capability::Emergency))
        .bind(required.contains(&Capability::CleanRoom))
        .bind(required.contains(&Capability::Narcotics))
        .bind(limit as i64)
        .fetch_all(conn)
        .await
        .map_err(Error::Database)?;

        Ok(rows)
    }

    /// Fallback fetch: every active pharmacy with a known coordinate, in
    /// stable table order. Filtering and ranking happen client-side.
    pub async fn fetch_active_with_coordinates(conn: &mut PgConnection) -> Result<Vec<Pharmacy>> {
        let pharmacies = sqlx::query_as::<_, Pharmacy>(
            "SELECT * FROM pharmacies
             WHERE status = 'active'
               AND latitude IS NOT NULL
               AND longitude IS NOT NULL
             ORDER BY created_at, id",
        )
        .fetch_all(conn)
        .await
        .map_err(Error::Database)?;

        Ok(pharmacies)
    }

    /// Atomically increment `current_capacity`, guarded by the ceiling.
    /// Returns false when the pharmacy is already full (zero rows updated),
    /// in which case the caller must roll back the surrounding transaction.
    pub async fn increment_capacity(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE pharmacies
             SET current_capacity = current_capacity + 1,
                 updated_at = NOW()
             WHERE id = $1
               AND current_capacity < max_capacity",
        )
        .bind(id)
        .execute(conn)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }
}
