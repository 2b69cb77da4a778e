//! Care request and response handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{DoctorIdentity, PharmacyIdentity};
use crate::models::{PatientInfo, RejectionReasons};
use crate::state::AppState;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub pharmacy_id: Uuid,
    pub patient_info: PatientInfo,
    #[serde(default)]
    pub ai_document: Option<String>,
}

/// `POST /api/requests` — a doctor asks a pharmacy to accept a patient.
pub async fn create_request(
    State(state): State<AppState>,
    DoctorIdentity(doctor_id): DoctorIdentity,
    Json(body): Json<CreateRequestBody>,
) -> Result<Response> {
    let request = state
        .lifecycle
        .create(doctor_id, body.pharmacy_id, body.patient_info, body.ai_document)
        .await?;

    Ok((StatusCode::CREATED, Json(request)).into_response())
}

/// `GET /api/requests/:id` — visible to the requesting doctor and the target
/// pharmacy only.
pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    identity: RequestViewer,
) -> Result<Response> {
    let request = state.lifecycle.get(request_id).await?;

    let authorized = match identity {
        RequestViewer::Doctor(doctor_id) => request.doctor_id == doctor_id,
        RequestViewer::Pharmacy(pharmacy_id) => request.pharmacy_id == pharmacy_id,
    };
    if !authorized {
        // Do not leak existence to unrelated parties.
        return Err(Error::RequestNotFound(request_id));
    }

    Ok(Json(request).into_response())
}

/// Either side of a request, whichever identity header is present.
pub enum RequestViewer {
    Doctor(Uuid),
    Pharmacy(Uuid),
}

#[async_trait::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for RequestViewer {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self> {
        if let Ok(DoctorIdentity(id)) = DoctorIdentity::from_request_parts(parts, state).await {
            return Ok(RequestViewer::Doctor(id));
        }
        let PharmacyIdentity(id) = PharmacyIdentity::from_request_parts(parts, state).await?;
        Ok(RequestViewer::Pharmacy(id))
    }
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub accepted: bool,
    #[serde(default)]
    pub reasons: Option<RejectionReasons>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /api/requests/:id/response` — the pharmacy's single answer.
pub async fn respond_to_request(
    State(state): State<AppState>,
    PharmacyIdentity(pharmacy_id): PharmacyIdentity,
    Path(request_id): Path<Uuid>,
    Json(body): Json<RespondBody>,
) -> Result<Response> {
    let response = state
        .lifecycle
        .respond(request_id, pharmacy_id, body.accepted, body.reasons, body.notes)
        .await?;

    Ok((StatusCode::CREATED, Json(response)).into_response())
}
