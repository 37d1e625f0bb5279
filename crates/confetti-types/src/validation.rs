use std::fmt;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entitlement::MAX_GUEST_QUOTA;

pub const CAPTION_MAX_CHARS: usize = 150;
pub const DISPLAY_NAME_MAX_CHARS: usize = 50;
pub const PARTNER_NAME_MAX_CHARS: usize = 80;
pub const PASSWORD_MIN_CHARS: usize = 8;

pub const EVENT_CODE_LEN: usize = 6;
const EVENT_CODE_MAX_LEN: usize = 16;
/// No 0/O or 1/I, so codes survive being read aloud at a reception.
const EVENT_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("caption must be between 1 and {max} characters")]
    Caption { max: usize },

    #[error("{field} must be between 1 and {max} characters")]
    Length { field: &'static str, max: usize },

    #[error("event code must contain only letters and digits")]
    EventCode,

    #[error("event date must be formatted YYYY-MM-DD")]
    EventDate,

    #[error("guest quota must be between 1 and {max}")]
    Quota { max: u32 },

    #[error("email address is invalid")]
    Email,

    #[error("password must be at least {min} characters")]
    Password { min: usize },

    #[error("unsupported photo type: {0}")]
    FileType(String),

    #[error("captured_at must be an RFC 3339 timestamp")]
    Timestamp,
}

/// Public join key of a wedding event. Always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCode(String);

impl EventCode {
    /// Normalizes user input: surrounding whitespace is dropped and letters are
    /// uppercased, so " ab12cd " and "AB12CD" name the same event.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let code = input.trim().to_ascii_uppercase();
        if code.is_empty()
            || code.len() > EVENT_CODE_MAX_LEN
            || !code.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::EventCode);
        }
        Ok(Self(code))
    }

    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..EVENT_CODE_LEN)
            .map(|_| EVENT_CODE_ALPHABET[rng.random_range(0..EVENT_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `None` stays `None`; anything else must be 1..=150 characters once trimmed.
pub fn normalize_caption(caption: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(caption) = caption else {
        return Ok(None);
    };
    let trimmed = caption.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > CAPTION_MAX_CHARS {
        return Err(ValidationError::Caption {
            max: CAPTION_MAX_CHARS,
        });
    }
    Ok(Some(trimmed.to_string()))
}

pub fn normalize_name(field: &'static str, input: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > max {
        return Err(ValidationError::Length { field, max });
    }
    Ok(trimmed.to_string())
}

pub fn normalize_email(input: &str) -> Result<String, ValidationError> {
    let email = input.trim().to_lowercase();
    let valid = email.len() <= 254
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(ValidationError::Email);
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::Password {
            min: PASSWORD_MIN_CHARS,
        });
    }
    Ok(())
}

pub fn parse_event_date(input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| ValidationError::EventDate)
}

pub fn resolve_guest_quota(requested: Option<u32>, default: u32) -> Result<u32, ValidationError> {
    let quota = requested.unwrap_or(default);
    if quota == 0 || quota > MAX_GUEST_QUOTA {
        return Err(ValidationError::Quota {
            max: MAX_GUEST_QUOTA,
        });
    }
    Ok(quota)
}
