//! Route definitions for the `/stories` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{chapters, runs};
use crate::state::AppState;

/// Routes mounted at `/stories`.
///
/// ```text
/// POST   /{story_id}/runs                          -> runs::start
/// GET    /{story_id}/chapters/unlocked             -> chapters::unlocked
/// GET    /{story_id}/chapters/{step_no}/unlock     -> chapters::access
/// POST   /{story_id}/chapters/{step_no}/unlock     -> chapters::unlock
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{story_id}/runs", post(runs::start))
        .route("/{story_id}/chapters/unlocked", get(chapters::unlocked))
        .route(
            "/{story_id}/chapters/{step_no}/unlock",
            get(chapters::access).post(chapters::unlock),
        )
}
