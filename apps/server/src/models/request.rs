//! Care request model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request lifecycle status.
///
/// `pending` is the only non-terminal state; a request leaves it exactly
/// once, either through a pharmacy response or through expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Structured patient information attached to a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One doctor's ask that a specific pharmacy accept a specific patient.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CareRequest {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub pharmacy_id: Uuid,
    pub patient_info: sqlx::types::Json<PatientInfo>,
    pub ai_document: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_non_terminal_state() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Accepted.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Expired.is_terminal());
    }

    #[test]
    fn patient_info_tolerates_sparse_payloads() {
        let info: PatientInfo = serde_json::from_str(r#"{"medications": ["warfarin"]}"#).unwrap();
        assert_eq!(info.medications, vec!["warfarin"]);
        assert!(info.conditions.is_empty());
        assert!(info.treatment_plan.is_none());
    }
}
