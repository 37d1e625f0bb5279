use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use confetti_types::api::{Claims, Principal, Role};

use crate::error::ApiError;
use crate::state::AppState;

pub const COUPLE_TOKEN_DAYS: i64 = 30;
/// Guests keep their token on the device for the whole wedding season.
pub const GUEST_TOKEN_DAYS: i64 = 180;

/// Extract and validate the bearer JWT; handlers read the claims via
/// `Extension<Claims>`.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or(ApiError::Unauthorized("authentication required"))?;

    let claims = decode_token(&state.jwt_secret, bearer.token())?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("invalid or expired token"))
}

pub fn issue_token(
    secret: &str,
    sub: Uuid,
    name: &str,
    role: Role,
    event_id: Option<Uuid>,
) -> anyhow::Result<String> {
    let days = match role {
        Role::Couple => COUPLE_TOKEN_DAYS,
        Role::Guest => GUEST_TOKEN_DAYS,
    };
    let claims = Claims {
        sub,
        name: name.to_string(),
        role,
        event_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn principal(claims: &Claims) -> Result<Principal, ApiError> {
    claims
        .principal()
        .ok_or(ApiError::Unauthorized("token has no usable identity"))
}

/// The couple id, or 403 for guests.
pub fn require_couple(claims: &Claims) -> Result<Uuid, ApiError> {
    match principal(claims)? {
        Principal::Couple { couple_id } => Ok(couple_id),
        Principal::Guest { .. } => Err(ApiError::Forbidden("only the couple can do this")),
    }
}

/// (guest_id, event_id), or 403 for couples.
pub fn require_guest(claims: &Claims) -> Result<(Uuid, Uuid), ApiError> {
    match principal(claims)? {
        Principal::Guest { guest_id, event_id } => Ok((guest_id, event_id)),
        Principal::Couple { .. } => Err(ApiError::Forbidden("only guests can do this")),
    }
}
