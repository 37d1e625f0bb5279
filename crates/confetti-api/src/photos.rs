use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use confetti_db::{Access, CaptionOutcome, DeleteOutcome, FeedCursor, NewPhoto, UploadOutcome};
use confetti_storage::{ImageFormat, format::photo_path};
use confetti_types::api::{
    Claims, DeletePhotoResponse, PhotoResponse, UpdateCaptionRequest, UploadPhotoResponse,
};
use confetti_types::events::GatewayEvent;
use confetti_types::models::Photo;
use confetti_types::validation::{ValidationError, normalize_caption};

use crate::error::ApiError;
use crate::middleware::{principal, require_guest};
use crate::state::{AppState, AppStateInner};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// `created_at` of the oldest photo on the previous page.
    pub before: Option<String>,
    /// `id` of that photo, to resume inside a run of equal timestamps.
    pub before_id: Option<Uuid>,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
    pub caption: Option<String>,
    /// When the shot was taken, if the device knows. Defaults to now.
    pub captured_at: Option<String>,
}

pub(crate) fn photo_response(state: &AppStateInner, photo: &Photo) -> PhotoResponse {
    let signed = state.signer.sign(&photo.storage_path);
    PhotoResponse {
        id: photo.id,
        event_id: photo.event_id,
        guest_id: photo.guest_id,
        guest_display_name: photo.guest_display_name.clone(),
        caption: photo.caption.clone(),
        captured_at: photo.captured_at,
        created_at: photo.created_at,
        url: signed.url,
        url_expires_at: signed.expires_at,
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ValidationError::Timestamp)
}

/// GET /events/{event_id}/photos?limit=&before=&before_id=
///
/// The couple always sees the feed; a guest only after their first upload.
pub async fn list_photos(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal(&claims)?;
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let before = match query.before.as_deref() {
        Some(raw) => Some(FeedCursor {
            created_at: parse_timestamp(raw)?,
            id: query.before_id,
        }),
        None if query.before_id.is_some() => {
            return Err(ApiError::BadRequest("before_id requires before"));
        }
        None => None,
    };

    let access = state
        .run_db(move |db| db.access(&principal, event_id))
        .await?;
    match access {
        Access::Denied => return Err(ApiError::Forbidden("not a member of this event")),
        Access::Guest { unlocked: false } => return Err(ApiError::FeedLocked),
        Access::Owner | Access::Guest { unlocked: true } => {}
    }

    let photos = state
        .run_db(move |db| db.list_photos(event_id, limit, before))
        .await?;

    let body: Vec<PhotoResponse> = photos.iter().map(|p| photo_response(&state, p)).collect();
    Ok(Json(body))
}

/// POST /events/{event_id}/photos?file_name=&caption=&captured_at=
///
/// Body is the raw image. The blob is written first; the row and the
/// allowance change are committed together afterwards, and the blob is
/// discarded if that commit is refused.
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UploadQuery>,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (guest_id, guest_event) = require_guest(&claims)?;
    if guest_event != event_id {
        return Err(ApiError::Forbidden("not a member of this event"));
    }

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("photo is empty"));
    }
    if bytes.len() > state.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(state.max_upload_bytes));
    }

    let format = ImageFormat::from_file_name(&query.file_name)
        .ok_or_else(|| ValidationError::FileType(query.file_name.clone()))?;
    let caption = normalize_caption(query.caption.as_deref())?;
    let captured_at = match query.captured_at.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => confetti_db::now(),
    };

    // Skip the disk write for guests who are already out of photos.
    let guest = state
        .run_db(move |db| db.get_guest(guest_id))
        .await?
        .ok_or(ApiError::NotFound("guest"))?;
    if !guest.entitlement.can_upload() {
        return Err(ApiError::QuotaExhausted);
    }

    let photo_id = Uuid::new_v4();
    let path = photo_path(event_id, guest_id, photo_id, format);
    let blob = state.store.put(&path, &bytes).await?;

    let new_photo = NewPhoto {
        id: photo_id,
        event_id,
        guest_id,
        storage_path: blob.path.clone(),
        sha256: blob.sha256,
        caption,
        captured_at,
    };
    let outcome = match state.run_db(move |db| db.record_upload(&new_photo)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            state.discard_blob(&blob.path).await;
            return Err(e);
        }
    };

    let (photo, entitlement) = match outcome {
        UploadOutcome::Recorded { photo, entitlement } => (photo, entitlement),
        UploadOutcome::QuotaExhausted => {
            state.discard_blob(&blob.path).await;
            return Err(ApiError::QuotaExhausted);
        }
        UploadOutcome::UnknownGuest => {
            state.discard_blob(&blob.path).await;
            return Err(ApiError::NotFound("guest"));
        }
    };

    info!(
        "Guest {} uploaded photo {} ({} bytes, {} left)",
        guest_id, photo.id, blob.size, entitlement.photos_remaining
    );

    let response = photo_response(&state, &photo);
    state.dispatcher.publish(GatewayEvent::PhotoCreate {
        event_id,
        photo: response.clone(),
    });
    state
        .dispatcher
        .send_to(guest_id, GatewayEvent::QuotaUpdate { guest_id, entitlement })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(UploadPhotoResponse {
            photo: response,
            entitlement,
        }),
    ))
}

/// PATCH /photos/{photo_id}: set or clear the caption. Uploader only.
pub async fn update_caption(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCaptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (guest_id, _) = require_guest(&claims)?;
    let caption = normalize_caption(req.caption.as_deref())?;

    let outcome = state
        .run_db(move |db| db.update_caption(photo_id, guest_id, caption.as_deref()))
        .await?;
    let photo = match outcome {
        CaptionOutcome::Updated(photo) => photo,
        CaptionOutcome::NotFound => return Err(ApiError::NotFound("photo")),
        CaptionOutcome::NotOwner => {
            return Err(ApiError::Forbidden("only the uploader can edit this photo"));
        }
    };

    debug!("Guest {} updated caption on photo {}", guest_id, photo.id);

    state.dispatcher.publish(GatewayEvent::PhotoUpdate {
        event_id: photo.event_id,
        photo_id: photo.id,
        caption: photo.caption.clone(),
    });

    Ok(Json(photo_response(&state, &photo)))
}

/// DELETE /photos/{photo_id}: remove a photo and give the slot back.
/// Uploader only.
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (guest_id, _) = require_guest(&claims)?;

    let outcome = state
        .run_db(move |db| db.delete_photo(photo_id, guest_id))
        .await?;
    let (photo, entitlement) = match outcome {
        DeleteOutcome::Deleted { photo, entitlement } => (photo, entitlement),
        DeleteOutcome::NotFound => return Err(ApiError::NotFound("photo")),
        DeleteOutcome::NotOwner => {
            return Err(ApiError::Forbidden("only the uploader can delete this photo"));
        }
    };

    // The row is gone either way; a stuck blob is an orphan for the sweeper.
    state.discard_blob(&photo.storage_path).await;

    info!(
        "Guest {} deleted photo {} ({} left)",
        guest_id, photo.id, entitlement.photos_remaining
    );

    state.dispatcher.publish(GatewayEvent::PhotoDelete {
        event_id: photo.event_id,
        photo_id: photo.id,
        guest_id,
    });
    state
        .dispatcher
        .send_to(guest_id, GatewayEvent::QuotaUpdate { guest_id, entitlement })
        .await;

    Ok(Json(DeletePhotoResponse {
        photo_id: photo.id,
        entitlement,
    }))
}
