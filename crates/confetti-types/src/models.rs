use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::Entitlement;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Couple {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeddingEvent {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub partner_one: String,
    pub partner_two: String,
    pub event_date: NaiveDate,
    pub code: String,
    /// Storage path of the cover image, relative to the media root.
    pub cover_path: Option<String>,
    pub guest_quota: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub id: Uuid,
    pub event_id: Uuid,
    pub display_name: String,
    #[serde(flatten)]
    pub entitlement: Entitlement,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub event_id: Uuid,
    pub guest_id: Uuid,
    pub guest_display_name: String,
    pub storage_path: String,
    pub sha256: String,
    pub caption: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
