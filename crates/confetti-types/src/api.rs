use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::Entitlement;

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Couple,
    Guest,
}

/// JWT claims shared by the REST middleware and the gateway upgrade.
/// Guest tokens always carry the event they were issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    pub exp: usize,
}

/// The authenticated caller, resolved from [`Claims`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    Couple { couple_id: Uuid },
    Guest { guest_id: Uuid, event_id: Uuid },
}

impl Claims {
    /// `None` for a guest token that lost its event scope.
    pub fn principal(&self) -> Option<Principal> {
        match self.role {
            Role::Couple => Some(Principal::Couple { couple_id: self.sub }),
            Role::Guest => self.event_id.map(|event_id| Principal::Guest {
                guest_id: self.sub,
                event_id,
            }),
        }
    }
}

impl Principal {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Couple { couple_id } => *couple_id,
            Self::Guest { guest_id, .. } => *guest_id,
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub couple_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub couple_id: Uuid,
    pub display_name: String,
    pub token: String,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub partner_one: String,
    pub partner_two: String,
    pub event_date: String,
    #[serde(default)]
    pub guest_quota: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub partner_one: String,
    pub partner_two: String,
    pub event_date: NaiveDate,
    pub code: String,
    pub guest_quota: u32,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardGuest {
    pub guest_id: Uuid,
    pub display_name: String,
    pub photos_uploaded: u32,
    #[serde(flatten)]
    pub entitlement: Entitlement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub event: EventResponse,
    pub guest_count: u32,
    pub unlocked_guest_count: u32,
    pub photo_count: u32,
    pub guests: Vec<DashboardGuest>,
}

// -- Guests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinEventRequest {
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub display_name: String,
    #[serde(flatten)]
    pub entitlement: Entitlement,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinEventResponse {
    pub guest: GuestResponse,
    pub token: String,
}

// -- Photos --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub guest_id: Uuid,
    pub guest_display_name: String,
    pub caption: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub url_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadPhotoResponse {
    pub photo: PhotoResponse,
    pub entitlement: Entitlement,
}

/// `caption: null` clears the caption.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCaptionRequest {
    pub caption: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePhotoResponse {
    pub photo_id: Uuid,
    pub entitlement: Entitlement,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
