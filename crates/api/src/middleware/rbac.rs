//! Admin gate for the ledger and provisioning surface.
//!
//! Readers only ever touch their own runs and balance. Anything that moves
//! another user's coins goes through [`RequireAdmin`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use taleforge_core::error::CoreError;
use taleforge_core::roles::ROLE_ADMIN;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// An authenticated caller holding the `admin` role. 401 without a token,
/// 403 with a reader token.
///
/// ```ignore
/// async fn refund(RequireAdmin(admin): RequireAdmin) -> AppResult<Json<()>> {
///     tracing::info!(admin_id = admin.user_id, "refund issued");
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl TryFrom<AuthUser> for RequireAdmin {
    type Error = CoreError;

    fn try_from(user: AuthUser) -> Result<Self, Self::Error> {
        if user.role != ROLE_ADMIN {
            tracing::warn!(user_id = user.user_id, role = %user.role, "Admin route refused");
            return Err(CoreError::Forbidden("Admin role required".into()));
        }
        Ok(RequireAdmin(user))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(RequireAdmin::try_from(user)?)
    }
}
