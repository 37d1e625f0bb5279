pub mod auth;
pub mod error;
pub mod events;
pub mod gateway;
pub mod guests;
pub mod media;
pub mod middleware;
pub mod photos;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// All HTTP and WebSocket routes. Cross-cutting layers (CORS, tracing) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/events/code/{code}", get(events::get_event_by_code))
        .route("/events/code/{code}/guests", post(guests::join_event))
        .route("/media/{*path}", get(media::serve_media))
        .route("/gateway", get(gateway::ws_upgrade));

    let protected_routes = Router::new()
        .route("/events", post(events::create_event).get(events::list_events))
        .route("/events/{event_id}", get(events::get_event))
        .route("/events/{event_id}/cover", put(events::set_cover))
        .route("/events/{event_id}/dashboard", get(events::dashboard))
        .route(
            "/events/{event_id}/photos",
            get(photos::list_photos).post(photos::upload_photo),
        )
        .route(
            "/photos/{photo_id}",
            patch(photos::update_caption).delete(photos::delete_photo),
        )
        .route("/guests/me", get(guests::me))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
