//! Route definitions for the `/admin` surface: reader provisioning and the
//! ledger.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// POST   /users                             -> create_user
/// POST   /coins/credit                      -> credit
/// POST   /coins/adjust                      -> adjust
/// POST   /coins/transactions/{id}/refund    -> refund
/// GET    /reward-rules                      -> reward_rules
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(admin::create_user))
        .route("/coins/credit", post(admin::credit))
        .route("/coins/adjust", post(admin::adjust))
        .route("/coins/transactions/{id}/refund", post(admin::refund))
        .route("/reward-rules", get(admin::reward_rules))
}
