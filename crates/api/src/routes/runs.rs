//! Route definitions for the `/runs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Routes mounted at `/runs`.
///
/// ```text
/// GET    /{run_id}/current     -> current
/// POST   /{run_id}/choose      -> choose
/// POST   /{run_id}/rating      -> rate
/// POST   /{run_id}/finish      -> finish
/// GET    /{run_id}/history     -> history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{run_id}/current", get(runs::current))
        .route("/{run_id}/choose", post(runs::choose))
        .route("/{run_id}/rating", post(runs::rate))
        .route("/{run_id}/finish", post(runs::finish))
        .route("/{run_id}/history", get(runs::history))
}
