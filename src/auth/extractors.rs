use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Path},
    http::request::Parts,
};
use tracing::warn;

use super::{jwt::JwtKeys, repo_types::User};
use crate::{error::AppError, state::AppState};

/// Caller identified by a verified bearer token.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("invalid auth scheme"))?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::unauthorized("invalid or expired token")
        })?;

        let user = state.users.find_by_id(claims.sub).await?.ok_or_else(|| {
            warn!(user_id = %claims.sub, "token for unknown user");
            AppError::unauthorized("user no longer exists")
        })?;

        Ok(AuthUser(user))
    }
}

/// Authenticated caller who owns the `/:username/...` dashboard being hit.
///
/// The path segment only selects a dashboard; identity always comes from the
/// token, and a mismatch is refused.
pub struct DashboardUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for DashboardUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::NotFound(e.body_text()))?;
        let requested = params
            .get("username")
            .ok_or_else(|| AppError::NotFound("dashboard not found".into()))?;

        if *requested != user.username {
            warn!(
                user_id = %user.id,
                requested = %requested,
                "token owner tried to access another user's dashboard"
            );
            return Err(AppError::Forbidden(
                "token does not grant access to this dashboard".into(),
            ));
        }

        Ok(DashboardUser(user))
    }
}
