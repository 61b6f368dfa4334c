use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use simplechat_core::accounts::{self, NewAccount};
use simplechat_core::{CoreError, Engine};
use simplechat_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, UserResponse};
use simplechat_types::models::User;
use uuid::Uuid;

use crate::{ApiError, blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Engine,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(move || {
        accounts::validate_username(&req.username)?;
        accounts::validate_password(&req.password)?;

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let hash_pass = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?
            .to_string();

        Ok(state.engine.accounts.register(&NewAccount {
            full_name: &req.full_name,
            username: &req.username,
            email: req.email.as_deref(),
            hash_pass: &hash_pass,
        })?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(move || {
        let (user, hash_pass) = state.engine.accounts.credentials(&req.username)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&hash_pass)
            .map_err(|e| ApiError::Internal(format!("stored hash for {} is invalid: {e}", user.id)))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| {
                CoreError::Unauthenticated(format!("wrong password for '{}'", user.username))
            })?;

        let user = state.engine.accounts.record_login(user.id)?;
        let access_token = create_token(&state.jwt_secret, &user, state.token_ttl)?;

        Ok(LoginResponse {
            access_token,
            user: user.into(),
        })
    })
    .await?;

    Ok(Json(response))
}

pub fn create_token(
    secret: &str,
    user: &User,
    ttl: chrono::Duration,
) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        jti: Uuid::new_v4(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}
