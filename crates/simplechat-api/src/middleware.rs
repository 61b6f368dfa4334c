use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use simplechat_types::api::Claims;
use simplechat_types::models::UserId;

use crate::{ApiError, AppState, blocking};

/// The authenticated user a request runs on behalf of.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: UserId,
    pub username: String,
}

/// Validate the bearer JWT, resolve its subject to a stored user and attach a
/// [`Caller`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.map_err(|e| ApiError::Unauthenticated(e.to_string()))?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ApiError::Unauthenticated(format!("invalid token: {e}")))?;

    let claims = token_data.claims;
    let resolver = state.clone();
    let user = blocking(move || {
        Ok(resolver
            .engine
            .identity
            .resolve(claims.sub, &claims.username)?)
    })
    .await?;

    req.extensions_mut().insert(Caller {
        id: user.id,
        username: user.username,
    });
    Ok(next.run(req).await)
}
