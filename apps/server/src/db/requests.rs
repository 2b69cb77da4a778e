//! Care request queries

use sqlx::postgres::PgConnection;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{CareRequest, PatientInfo, RequestStatus};
use crate::{Error, Result};

pub struct RequestRepository;

impl RequestRepository {
    pub async fn insert(
        conn: &mut PgConnection,
        doctor_id: Uuid,
        pharmacy_id: Uuid,
        patient_info: &PatientInfo,
        ai_document: Option<&str>,
    ) -> Result<CareRequest> {
        let request = sqlx::query_as::<_, CareRequest>(
            "INSERT INTO care_requests (doctor_id, pharmacy_id, patient_info, ai_document)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(doctor_id)
        .bind(pharmacy_id)
        .bind(Json(patient_info))
        .bind(ai_document)
        .fetch_one(conn)
        .await
        .map_err(Error::Database)?;

        Ok(request)
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<CareRequest>> {
        let request = sqlx::query_as::<_, CareRequest>(
            "SELECT * FROM care_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(Error::Database)?;

        Ok(request)
    }

    /// Lock the request row for the duration of the surrounding transaction.
    /// Serializes concurrent responses to the same request.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<CareRequest>> {
        let request = sqlx::query_as::<_, CareRequest>(
            "SELECT * FROM care_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(Error::Database)?;

        Ok(request)
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE care_requests SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(conn)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}
