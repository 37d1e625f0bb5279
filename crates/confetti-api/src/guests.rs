use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use confetti_types::api::{Claims, GuestResponse, JoinEventRequest, JoinEventResponse, Role};
use confetti_types::entitlement::Entitlement;
use confetti_types::events::GatewayEvent;
use confetti_types::models::Guest;
use confetti_types::validation::{DISPLAY_NAME_MAX_CHARS, EventCode, normalize_name};

use crate::error::ApiError;
use crate::middleware::{issue_token, require_guest};
use crate::state::AppState;

fn guest_response(guest: Guest) -> GuestResponse {
    GuestResponse {
        id: guest.id,
        event_id: guest.event_id,
        display_name: guest.display_name,
        entitlement: guest.entitlement,
    }
}

/// POST /events/code/{code}/guests: join with just a display name.
/// Every join creates a fresh guest with a full allowance.
pub async fn join_event(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<JoinEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let code = EventCode::parse(&code)?;
    let display_name = normalize_name("display_name", &req.display_name, DISPLAY_NAME_MAX_CHARS)?;

    let event = state
        .run_db(move |db| db.get_event_by_code(code.as_str()))
        .await?
        .ok_or(ApiError::NotFound("event"))?;

    let guest = Guest {
        id: Uuid::new_v4(),
        event_id: event.id,
        display_name,
        entitlement: Entitlement::grant(event.guest_quota),
        created_at: confetti_db::now(),
    };

    let record = guest.clone();
    state.run_db(move |db| db.insert_guest(&record)).await?;

    let token = issue_token(
        &state.jwt_secret,
        guest.id,
        &guest.display_name,
        Role::Guest,
        Some(event.id),
    )?;

    info!(
        "Guest {} ({}) joined event {}",
        guest.display_name, guest.id, event.id
    );

    state.dispatcher.publish(GatewayEvent::GuestJoined {
        event_id: event.id,
        guest_id: guest.id,
        display_name: guest.display_name.clone(),
    });

    Ok((
        StatusCode::CREATED,
        Json(JoinEventResponse {
            guest: guest_response(guest),
            token,
        }),
    ))
}

/// GET /guests/me
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (guest_id, _) = require_guest(&claims)?;
    let guest = state
        .run_db(move |db| db.get_guest(guest_id))
        .await?
        .ok_or(ApiError::NotFound("guest"))?;

    Ok(Json(guest_response(guest)))
}
