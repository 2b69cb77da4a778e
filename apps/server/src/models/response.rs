//! Care response model - a pharmacy's single, immutable answer to a request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured rejection reason checkboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    InventoryShortage,
    Capacity,
    ControlledSubstance,
    OutOfScope,
}

/// Reason set attached to a rejection: at least one checkbox or a non-empty
/// free-text "other" is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectionReasons {
    #[serde(default)]
    pub selected: Vec<RejectionReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
}

impl RejectionReasons {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.other.as_deref().map_or(true, |s| s.trim().is_empty())
    }
}

/// The pharmacy's answer to a care request. Immutable once created; the
/// unique constraint on `request_id` enforces at-most-one per request.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CareResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub pharmacy_id: Uuid,
    pub accepted: bool,
    pub reasons: Option<sqlx::types::Json<RejectionReasons>>,
    pub notes: Option<String>,
    pub responded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reason_set_is_detected() {
        assert!(RejectionReasons::default().is_empty());
        assert!(RejectionReasons {
            selected: vec![],
            other: Some("   ".to_string()),
        }
        .is_empty());
    }

    #[test]
    fn checkbox_or_other_text_counts() {
        assert!(!RejectionReasons {
            selected: vec![RejectionReason::Capacity],
            other: None,
        }
        .is_empty());
        assert!(!RejectionReasons {
            selected: vec![],
            other: Some("no refrigerated storage".to_string()),
        }
        .is_empty());
    }

    #[test]
    fn reasons_use_snake_case_on_the_wire() {
        let json = serde_json::to_string(&RejectionReason::ControlledSubstance).unwrap();
        assert_eq!(json, r#""controlled_substance""#);
    }
}
