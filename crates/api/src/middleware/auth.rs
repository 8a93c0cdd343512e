//! Reader identity for handlers.
//!
//! Identities are minted by the account service as HS256 access tokens; the
//! API never sees passwords. A handler that takes [`AuthUser`] gets the
//! caller's id, role, and plan, or the request is rejected with 401 before
//! the handler runs.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use taleforge_core::error::CoreError;
use taleforge_core::types::DbId;

use crate::auth::jwt::{validate_token, Claims};
use crate::error::AppError;
use crate::state::AppState;

/// The caller of a run, coin, or chapter endpoint.
///
/// ```ignore
/// async fn balance(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, plan = %user.plan, "balance requested");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Owner id for runs, ledger entries, and unlocks.
    pub user_id: DbId,
    pub role: String,
    /// Only `free` readers are subject to chapter pricing.
    pub plan: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            user_id: claims.sub,
            role: claims.role,
            plan: claims.plan,
        }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Result<&str, CoreError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| CoreError::Unauthorized("Missing Authorization header".into()))?;
    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            CoreError::Unauthorized("Expected Authorization: Bearer <token>".into())
        })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = validate_token(token, &state.config.jwt).map_err(|err| {
            tracing::debug!(error = %err, "Rejected access token");
            CoreError::Unauthorized("Invalid or expired token".into())
        })?;
        Ok(claims.into())
    }
}
