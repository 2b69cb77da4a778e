//! Domain models - pharmacies, care requests, responses

pub mod pharmacy;
pub mod request;
pub mod response;

pub use pharmacy::{Capability, Pharmacy, PharmacyStatus, PharmacySummary};
pub use request::{CareRequest, PatientInfo, RequestStatus};
pub use response::{CareResponse, RejectionReason, RejectionReasons};
