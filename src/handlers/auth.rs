use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::{
    common::state::AppState,
    errors::{AuthError, Error},
    models::auth::authenticate_token,
};

/// Extracts the authenticated user id from a `Authorization: Bearer <jwt>`
/// header. Rejects with 401 when the header is missing or the token is bad.
pub struct AuthUser(pub i64);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingToken)?;

        let user_id = authenticate_token(token, &state.config.jwt_keys.decoding)?;
        Ok(AuthUser(user_id))
    }
}
