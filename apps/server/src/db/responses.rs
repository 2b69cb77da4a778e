//! Care response queries

use sqlx::postgres::PgConnection;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{CareResponse, RejectionReasons};
use crate::{Error, Result};

pub struct ResponseRepository;

impl ResponseRepository {
    /// Insert the pharmacy's answer. The unique constraint on `request_id`
    /// is the at-most-one-answer enforcement point: a violation means a
    /// concurrent response won the race.
    pub async fn insert(
        conn: &mut PgConnection,
        request_id: Uuid,
        pharmacy_id: Uuid,
        accepted: bool,
        reasons: Option<&RejectionReasons>,
        notes: Option<&str>,
    ) -> Result<CareResponse> {
        let response = sqlx::query_as::<_, CareResponse>(
            "INSERT INTO care_responses (request_id, pharmacy_id, accepted, reasons, notes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(request_id)
        .bind(pharmacy_id)
        .bind(accepted)
        .bind(reasons.map(Json))
        .bind(notes)
        .fetch_one(conn)
        .await
        .map_err(|e| match unique_violation(&e) {
            true => Error::AlreadyResponded(request_id),
            false => Error::Database(e),
        })?;

        Ok(response)
    }

    pub async fn find_by_request(
        conn: &mut PgConnection,
        request_id: Uuid,
    ) -> Result<Option<CareResponse>> {
        let response = sqlx::query_as::<_, CareResponse>(
            "SELECT * FROM care_responses WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(conn)
        .await
        .map_err(Error::Database)?;

        Ok(response)
    }
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
