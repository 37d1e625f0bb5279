use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use confetti_storage::{ImageFormat, format::cover_path};
use confetti_types::api::{Claims, CreateEventRequest, DashboardGuest, DashboardResponse, EventResponse};
use confetti_types::models::WeddingEvent;
use confetti_types::validation::{
    EventCode, PARTNER_NAME_MAX_CHARS, ValidationError, normalize_name, parse_event_date,
    resolve_guest_quota,
};

use crate::error::ApiError;
use crate::middleware::{principal, require_couple};
use crate::state::{AppState, AppStateInner};

/// Attempts at drawing an unused event code before giving up.
const CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Deserialize)]
pub struct CoverQuery {
    pub file_name: String,
}

pub(crate) fn event_response(state: &AppStateInner, event: &WeddingEvent) -> EventResponse {
    EventResponse {
        id: event.id,
        partner_one: event.partner_one.clone(),
        partner_two: event.partner_two.clone(),
        event_date: event.event_date,
        code: event.code.clone(),
        guest_quota: event.guest_quota,
        cover_url: event.cover_path.as_deref().map(|path| state.signer.sign(path).url),
        created_at: event.created_at,
    }
}

/// POST /events
pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let couple_id = require_couple(&claims)?;

    let partner_one = normalize_name("partner_one", &req.partner_one, PARTNER_NAME_MAX_CHARS)?;
    let partner_two = normalize_name("partner_two", &req.partner_two, PARTNER_NAME_MAX_CHARS)?;
    let event_date = parse_event_date(&req.event_date)?;
    let guest_quota = resolve_guest_quota(req.guest_quota, state.default_guest_quota)?;

    let mut event = WeddingEvent {
        id: Uuid::new_v4(),
        couple_id,
        partner_one,
        partner_two,
        event_date,
        code: String::new(),
        cover_path: None,
        guest_quota,
        created_at: confetti_db::now(),
    };

    for attempt in 1..=CODE_ATTEMPTS {
        event.code = EventCode::generate().to_string();

        let candidate = event.clone();
        if state.run_db(move |db| db.insert_event(&candidate)).await? {
            info!(
                "Couple {} created event {} ({})",
                couple_id, event.id, event.code
            );
            return Ok((StatusCode::CREATED, Json(event_response(&state, &event))));
        }
        warn!("Event code {} already taken (attempt {})", event.code, attempt);
    }

    Err(ApiError::Internal(anyhow::anyhow!(
        "no free event code after {} attempts",
        CODE_ATTEMPTS
    )))
}

/// GET /events
pub async fn list_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let couple_id = require_couple(&claims)?;
    let events = state
        .run_db(move |db| db.list_events_for_couple(couple_id))
        .await?;

    let body: Vec<EventResponse> = events.iter().map(|e| event_response(&state, e)).collect();
    Ok(Json(body))
}

/// GET /events/{event_id}
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal(&claims)?;
    let (event, access) = state
        .run_db(move |db| {
            let event = db.get_event(event_id)?;
            let access = db.access(&principal, event_id)?;
            Ok((event, access))
        })
        .await?;

    let event = event.ok_or(ApiError::NotFound("event"))?;
    if !access.can_read_event() {
        return Err(ApiError::Forbidden("not a member of this event"));
    }

    Ok(Json(event_response(&state, &event)))
}

/// GET /events/code/{code}: what a guest sees before joining.
pub async fn get_event_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let code = EventCode::parse(&code)?;
    let event = state
        .run_db(move |db| db.get_event_by_code(code.as_str()))
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    Ok(Json(event_response(&state, &event)))
}

/// PUT /events/{event_id}/cover?file_name=
pub async fn set_cover(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CoverQuery>,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let couple_id = require_couple(&claims)?;
    require_owner(&state, couple_id, event_id).await?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("cover image is empty"));
    }
    if bytes.len() > state.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(state.max_upload_bytes));
    }
    let format = ImageFormat::from_file_name(&query.file_name)
        .ok_or_else(|| ValidationError::FileType(query.file_name.clone()))?;

    let path = cover_path(event_id, Uuid::new_v4(), format);
    state.store.put(&path, &bytes).await?;

    let new_path = path.clone();
    let previous = match state
        .run_db(move |db| db.set_event_cover(event_id, &new_path))
        .await
    {
        Ok(previous) => previous,
        Err(e) => {
            state.discard_blob(&path).await;
            return Err(e);
        }
    };
    if let Some(previous) = previous {
        state.discard_blob(&previous).await;
    }

    let event = state
        .run_db(move |db| db.get_event(event_id))
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    info!("Cover for event {} set to {}", event_id, path);
    Ok(Json(event_response(&state, &event)))
}

/// GET /events/{event_id}/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let couple_id = require_couple(&claims)?;
    let event = require_owner(&state, couple_id, event_id).await?;

    let (guests, photo_count) = state
        .run_db(move |db| {
            let guests = db.list_guests_with_counts(event_id)?;
            let photo_count = db.count_photos(event_id)?;
            Ok((guests, photo_count))
        })
        .await?;

    let unlocked_guest_count = guests
        .iter()
        .filter(|(guest, _)| guest.entitlement.has_unlocked_feed)
        .count() as u32;

    let guests: Vec<DashboardGuest> = guests
        .into_iter()
        .map(|(guest, photos_uploaded)| DashboardGuest {
            guest_id: guest.id,
            display_name: guest.display_name,
            photos_uploaded,
            entitlement: guest.entitlement,
        })
        .collect();

    Ok(Json(DashboardResponse {
        event: event_response(&state, &event),
        guest_count: guests.len() as u32,
        unlocked_guest_count,
        photo_count,
        guests,
    }))
}

/// Loads the event and checks that `couple_id` owns it.
async fn require_owner(
    state: &AppStateInner,
    couple_id: Uuid,
    event_id: Uuid,
) -> Result<WeddingEvent, ApiError> {
    let event = state
        .run_db(move |db| db.get_event(event_id))
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    if event.couple_id != couple_id {
        return Err(ApiError::Forbidden("only the couple can manage this event"));
    }
    Ok(event)
}
