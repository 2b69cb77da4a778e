//! Request lifecycle manager
//!
//! Owns every transition of a care request, and is the only writer of
//! `pharmacy.current_capacity`. The response path runs as one transaction:
//! row lock on the request, response insert, status transition, and the
//! guarded capacity increment commit or roll back together.

use std::sync::Arc;

use sqlx::Connection;
use uuid::Uuid;

use crate::db::{PgPool, PharmacyRepository, RequestRepository, ResponseRepository};
use crate::models::{
    CareRequest, CareResponse, PatientInfo, PharmacyStatus, RejectionReasons, RequestStatus,
};
use crate::{Error, Result};

pub struct RequestLifecycle {
    pool: Arc<PgPool>,
}

impl RequestLifecycle {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a pending request from a doctor to an active pharmacy.
    ///
    /// Capacity is deliberately not checked here: it is advisory at creation
    /// time and authoritative at response time, so a pharmacy that fills up
    /// between search and submission still sees the request.
    pub async fn create(
        &self,
        doctor_id: Uuid,
        pharmacy_id: Uuid,
        patient_info: PatientInfo,
        ai_document: Option<String>,
    ) -> Result<CareRequest> {
        let mut conn = self.pool.acquire().await?;

        let pharmacy = PharmacyRepository::find_by_id(&mut conn, pharmacy_id)
            .await?
            .ok_or(Error::PharmacyUnavailable(pharmacy_id))?;
        if pharmacy.status != PharmacyStatus::Active {
            return Err(Error::PharmacyUnavailable(pharmacy_id));
        }

        let request = RequestRepository::insert(
            &mut conn,
            doctor_id,
            pharmacy_id,
            &patient_info,
            ai_document.as_deref(),
        )
        .await?;

        tracing::info!(
            request_id = %request.id,
            pharmacy_id = %pharmacy_id,
            "Care request created"
        );

        Ok(request)
    }

    pub async fn get(&self, request_id: Uuid) -> Result<CareRequest> {
        let mut conn = self.pool.acquire().await?;
        RequestRepository::find_by_id(&mut conn, request_id)
            .await?
            .ok_or(Error::RequestNotFound(request_id))
    }

    /// Record the pharmacy's single answer and close the request.
    ///
    /// Preconditions (checked under a row lock, in order): the request
    /// exists, the responding pharmacy is its target, and it is still
    /// pending. The unique constraint on `care_responses.request_id` backs
    /// the lock up against races; either way the loser of a concurrent
    /// respond sees `AlreadyResponded`.
    pub async fn respond(
        &self,
        request_id: Uuid,
        pharmacy_id: Uuid,
        accepted: bool,
        reasons: Option<RejectionReasons>,
        notes: Option<String>,
    ) -> Result<CareResponse> {
        // Validation before any write: a rejection needs at least one
        // structured reason or a non-empty free-text one.
        let reasons = if accepted {
            None
        } else {
            let reasons = reasons.unwrap_or_default();
            if reasons.is_empty() {
                return Err(Error::Validation(
                    "a rejection requires at least one reason".to_string(),
                ));
            }
            Some(reasons)
        };

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await.map_err(Error::Database)?;

        let request = RequestRepository::lock_for_update(&mut tx, request_id)
            .await?
            .ok_or(Error::RequestNotFound(request_id))?;

        if request.pharmacy_id != pharmacy_id {
            return Err(Error::Forbidden {
                request_id,
                pharmacy_id,
            });
        }
        if request.status.is_terminal() {
            return Err(Error::AlreadyResponded(request_id));
        }

        let response = ResponseRepository::insert(
            &mut tx,
            request_id,
            pharmacy_id,
            accepted,
            reasons.as_ref(),
            notes.as_deref(),
        )
        .await?;

        let next_status = if accepted {
            RequestStatus::Accepted
        } else {
            RequestStatus::Rejected
        };
        RequestRepository::set_status(&mut tx, request_id, next_status).await?;

        if accepted {
            // Guarded increment; zero rows means the pharmacy filled up
            // since the request was created, and the whole answer aborts.
            let incremented = PharmacyRepository::increment_capacity(&mut tx, pharmacy_id).await?;
            if !incremented {
                return Err(Error::CapacityExceeded(pharmacy_id));
            }
        }

        tx.commit().await.map_err(Error::Database)?;

        tracing::info!(
            request_id = %request_id,
            pharmacy_id = %pharmacy_id,
            accepted,
            "Care request responded"
        );

        Ok(response)
    }

    /// Time out a still-pending request. Invoked by an external scheduler;
    /// a request that already reached a terminal state is left untouched.
    pub async fn expire(&self, request_id: Uuid) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await.map_err(Error::Database)?;

        let request = RequestRepository::lock_for_update(&mut tx, request_id)
            .await?
            .ok_or(Error::RequestNotFound(request_id))?;

        if request.status.is_terminal() {
            return Ok(false);
        }

        RequestRepository::set_status(&mut tx, request_id, RequestStatus::Expired).await?;
        tx.commit().await.map_err(Error::Database)?;

        tracing::info!(request_id = %request_id, "Care request expired");
        Ok(true)
    }
}
