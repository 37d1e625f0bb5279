//! Inputs and outcomes of the write paths. Outcomes that are normal business
//! answers (quota exhausted, not the owner) are variants here rather than
//! errors, so callers can map each to the right response.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use confetti_types::entitlement::Entitlement;
use confetti_types::models::Photo;

pub struct NewPhoto {
    pub id: Uuid,
    pub event_id: Uuid,
    pub guest_id: Uuid,
    pub storage_path: String,
    pub sha256: String,
    pub caption: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Where the next feed page starts: photos older than `created_at`, plus
/// photos with that exact timestamp and a smaller `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    /// Without an id only the timestamp bounds the page.
    pub id: Option<Uuid>,
}

impl FeedCursor {
    /// The cursor for the page after `photo`.
    pub fn after(photo: &Photo) -> Self {
        Self {
            created_at: photo.created_at,
            id: Some(photo.id),
        }
    }
}

#[derive(Debug)]
pub enum UploadOutcome {
    Recorded { photo: Photo, entitlement: Entitlement },
    QuotaExhausted,
    UnknownGuest,
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted { photo: Photo, entitlement: Entitlement },
    NotFound,
    NotOwner,
}

#[derive(Debug)]
pub enum CaptionOutcome {
    Updated(Photo),
    NotFound,
    NotOwner,
}

/// How a principal relates to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    Guest { unlocked: bool },
    Denied,
}

impl Access {
    pub fn can_read_event(&self) -> bool {
        !matches!(self, Self::Denied)
    }

    pub fn can_view_feed(&self) -> bool {
        matches!(self, Self::Owner | Self::Guest { unlocked: true })
    }
}
