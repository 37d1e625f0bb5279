use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use confetti_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, Role};
use confetti_types::models::Couple;
use confetti_types::validation::{
    DISPLAY_NAME_MAX_CHARS, normalize_email, normalize_name, validate_password,
};

use crate::error::ApiError;
use crate::middleware::issue_token;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;
    let display_name = normalize_name("display_name", &req.display_name, DISPLAY_NAME_MAX_CHARS)?;

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let couple = Couple {
        id: Uuid::new_v4(),
        email,
        display_name,
        created_at: confetti_db::now(),
    };

    let record = couple.clone();
    let created = state
        .run_db(move |db| db.create_couple(&record, &password_hash))
        .await?;
    if !created {
        return Err(ApiError::Conflict("email is already registered"));
    }

    let token = issue_token(
        &state.jwt_secret,
        couple.id,
        &couple.display_name,
        Role::Couple,
        None,
    )?;

    info!("Couple {} registered", couple.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            couple_id: couple.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const BAD_LOGIN: ApiError = ApiError::Unauthorized("invalid email or password");

    let email = normalize_email(&req.email).map_err(|_| BAD_LOGIN)?;
    let (couple, password_hash) = state
        .run_db(move |db| db.get_couple_credentials(&email))
        .await?
        .ok_or(BAD_LOGIN)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&password_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is malformed: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| BAD_LOGIN)?;

    let token = issue_token(
        &state.jwt_secret,
        couple.id,
        &couple.display_name,
        Role::Couple,
        None,
    )?;

    Ok(Json(LoginResponse {
        couple_id: couple.id,
        display_name: couple.display_name,
        token,
    }))
}
