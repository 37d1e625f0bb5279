use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use confetti_storage::{ImageFormat, SignatureError};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub expires: i64,
    pub signature: String,
}

/// GET /media/{*path}?expires=&signature=
///
/// The signature is the only credential: links handed out in feed
/// responses work from a plain `<img src>` until they expire.
pub async fn serve_media(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .signer
        .verify(&path, query.expires, &query.signature)
        .map_err(|e| {
            debug!("Rejected media request for {}: {}", path, e);
            match e {
                SignatureError::Expired => ApiError::Forbidden("link has expired"),
                SignatureError::Invalid => ApiError::Forbidden("invalid signature"),
            }
        })?;

    let data = state
        .store
        .read(&path)
        .await?
        .ok_or(ApiError::NotFound("media"))?;

    let content_type = ImageFormat::from_file_name(&path)
        .map(ImageFormat::content_type)
        .unwrap_or("application/octet-stream");
    let max_age = (query.expires - Utc::now().timestamp()).max(0);

    // Blob paths embed a fresh id per write, so the path identifies the bytes.
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::ETAG, format!("\"{}\"", path.replace('/', "-"))),
            (header::CACHE_CONTROL, format!("private, max-age={}", max_age)),
        ],
        data,
    ))
}
