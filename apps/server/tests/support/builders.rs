//! Row builders for integration tests.

use caremesh::state::AppState;
use uuid::Uuid;

/// Insert-on-demand pharmacy builder with sensible defaults: active, open
/// capacity, no capability flags, located at Tokyo Station.
pub struct PharmacyBuilder {
    name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    current_capacity: i32,
    max_capacity: i32,
    status: &'static str,
    twenty_four_support: bool,
    holiday_support: bool,
    emergency_support: bool,
    has_clean_room: bool,
    handles_narcotics: bool,
}

impl Default for PharmacyBuilder {
    fn default() -> Self {
        Self {
            name: "Test Pharmacy".to_string(),
            latitude: Some(35.6812),
            longitude: Some(139.7671),
            current_capacity: 0,
            max_capacity: 10,
            status: "active",
            twenty_four_support: false,
            holiday_support: false,
            emergency_support: false,
            has_clean_room: false,
            handles_narcotics: false,
        }
    }
}

impl PharmacyBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn capacity(mut self, current: i32, max: i32) -> Self {
        self.current_capacity = current;
        self.max_capacity = max;
        self
    }

    pub fn status(mut self, status: &'static str) -> Self {
        self.status = status;
        self
    }

    pub fn narcotics(mut self) -> Self {
        self.handles_narcotics = true;
        self
    }

    pub fn clean_room(mut self) -> Self {
        self.has_clean_room = true;
        self
    }

    pub fn twenty_four(mut self) -> Self {
        self.twenty_four_support = true;
        self
    }

    pub async fn insert(self, state: &AppState) -> anyhow::Result<Uuid> {
        let mut conn = state
            .pool
            .acquire()
            .await
            .map_err(|e| anyhow::anyhow!("acquire: {e}"))?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO pharmacies
                 (name, address, latitude, longitude,
                  twenty_four_support, holiday_support, emergency_support,
                  has_clean_room, handles_narcotics,
                  current_capacity, max_capacity, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12::pharmacy_status)
             RETURNING id",
        )
        .bind(&self.name)
        .bind("1-1 Test Street")
        .bind(self.latitude)
        .bind(self.longitude)
        .bind(self.twenty_four_support)
        .bind(self.holiday_support)
        .bind(self.emergency_support)
        .bind(self.has_clean_room)
        .bind(self.handles_narcotics)
        .bind(self.current_capacity)
        .bind(self.max_capacity)
        .bind(self.status)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }
}

/// Fetch a pharmacy's current capacity directly.
pub async fn current_capacity(state: &AppState, pharmacy_id: Uuid) -> anyhow::Result<i32> {
    let mut conn = state
        .pool
        .acquire()
        .await
        .map_err(|e| anyhow::anyhow!("acquire: {e}"))?;
    let capacity: i32 =
        sqlx::query_scalar("SELECT current_capacity FROM pharmacies WHERE id = $1")
            .bind(pharmacy_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(capacity)
}

/// Minimal valid patient info payload.
pub fn patient_info() -> serde_json::Value {
    serde_json::json!({
        "medications": ["warfarin 1mg"],
        "conditions": ["post-operative care"],
        "treatment_plan": "weekly visit",
    })
}
