use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quota granted to each guest when the event does not specify one.
pub const DEFAULT_GUEST_QUOTA: u32 = 10;

/// Upper bound a couple may configure for an event.
pub const MAX_GUEST_QUOTA: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("photo quota exhausted")]
pub struct QuotaExhausted;

/// A guest's upload allowance.
///
/// Uploading consumes one unit and unlocks the feed; deleting one of your own
/// photos gives a unit back, never above the quota granted at join. The unlock
/// flag is sticky: no transition clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub photo_quota: u32,
    pub photos_remaining: u32,
    pub has_unlocked_feed: bool,
}

impl Entitlement {
    /// Fresh allowance for a guest who just joined.
    pub fn grant(photo_quota: u32) -> Self {
        Self {
            photo_quota,
            photos_remaining: photo_quota,
            has_unlocked_feed: false,
        }
    }

    pub fn can_upload(&self) -> bool {
        self.photos_remaining > 0
    }

    /// State after one successful upload.
    pub fn consume(self) -> Result<Self, QuotaExhausted> {
        if !self.can_upload() {
            return Err(QuotaExhausted);
        }
        Ok(Self {
            photos_remaining: self.photos_remaining - 1,
            has_unlocked_feed: true,
            ..self
        })
    }

    /// State after the guest deletes one of their photos.
    pub fn restore(self) -> Self {
        Self {
            photos_remaining: (self.photos_remaining + 1).min(self.photo_quota),
            ..self
        }
    }

    pub fn photos_used(&self) -> u32 {
        self.photo_quota.saturating_sub(self.photos_remaining)
    }
}
