//! Pharmacy model and capability tags

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use caremesh_geo::Coordinate;

/// Pharmacy lifecycle status. Only `active` pharmacies are search-eligible
/// and may be targeted by new care requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pharmacy_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PharmacyStatus {
    Pending,
    Active,
    Inactive,
}

/// A named boolean capability used as a hard filter in search.
///
/// Fixed enumeration rather than a free-form key set, so filter logic is
/// exhaustive: adding a variant forces every match site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TwentyFour,
    Holiday,
    Emergency,
    CleanRoom,
    Narcotics,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::TwentyFour,
        Capability::Holiday,
        Capability::Emergency,
        Capability::CleanRoom,
        Capability::Narcotics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TwentyFour => "twenty_four",
            Capability::Holiday => "holiday",
            Capability::Emergency => "emergency",
            Capability::CleanRoom => "clean_room",
            Capability::Narcotics => "narcotics",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "twenty_four" => Ok(Capability::TwentyFour),
            "holiday" => Ok(Capability::Holiday),
            "emergency" => Ok(Capability::Emergency),
            "clean_room" => Ok(Capability::CleanRoom),
            "narcotics" => Ok(Capability::Narcotics),
            other => Err(format!("unknown capability tag: {other}")),
        }
    }
}

/// A registered care-providing location.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Pharmacy {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub twenty_four_support: bool,
    pub holiday_support: bool,
    pub emergency_support: bool,
    pub has_clean_room: bool,
    pub handles_narcotics: bool,
    pub current_capacity: i32,
    pub max_capacity: i32,
    pub coverage_radius_km: Option<f64>,
    pub status: PharmacyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pharmacy {
    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::TwentyFour => self.twenty_four_support,
            Capability::Holiday => self.holiday_support,
            Capability::Emergency => self.emergency_support,
            Capability::CleanRoom => self.has_clean_room,
            Capability::Narcotics => self.handles_narcotics,
        }
    }

    pub fn has_available_capacity(&self) -> bool {
        self.current_capacity < self.max_capacity
    }

    /// Known coordinate pair, if both columns are populated and in range.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng).ok(),
            _ => None,
        }
    }
}

/// Search-facing projection of a pharmacy. Contact details are included;
/// capacity is reduced to an availability flag so absolute patient counts
/// stay private.
#[derive(Debug, Clone, Serialize)]
pub struct PharmacySummary {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub capabilities: Vec<Capability>,
    pub accepting_patients: bool,
    pub distance_km: String,
}

impl PharmacySummary {
    pub fn from_pharmacy(pharmacy: &Pharmacy, distance_km: f64) -> Self {
        let capabilities = Capability::ALL
            .into_iter()
            .filter(|c| pharmacy.has_capability(*c))
            .collect();

        Self {
            id: pharmacy.id,
            name: pharmacy.name.clone(),
            address: pharmacy.address.clone(),
            phone: pharmacy.phone.clone(),
            email: pharmacy.email.clone(),
            capabilities,
            accepting_patients: pharmacy.has_available_capacity(),
            distance_km: format!("{distance_km:.1}"),
        }
    }
}
