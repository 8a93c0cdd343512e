//! Handlers for chapter access: peek at the gate, pay to unlock, or list
//! what the reader already owns.

use axum::extract::{Path, State};
use axum::Json;
use taleforge_core::coin_ledger::RedeemOutcome;
use taleforge_core::types::DbId;
use taleforge_db::models::coin::ChapterUnlock;
use taleforge_db::repositories::ChapterUnlockRepo;

use crate::engine::{ChapterAccess, ChapterGate};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/stories/{story_id}/chapters/{step_no}/unlock
///
/// Reports whether the chapter is open. Never charges coins.
pub async fn access(
    State(state): State<AppState>,
    user: AuthUser,
    Path((story_id, step_no)): Path<(DbId, i32)>,
) -> AppResult<Json<DataResponse<ChapterAccess>>> {
    let access = ChapterGate::new(&state.pool, &state.pricing)
        .access(user.user_id, &user.plan, story_id, step_no)
        .await?;
    Ok(Json(DataResponse { data: access }))
}

/// POST /api/v1/stories/{story_id}/chapters/{step_no}/unlock
///
/// Redeem coins for a permanent unlock. 402 if the balance is short.
pub async fn unlock(
    State(state): State<AppState>,
    user: AuthUser,
    Path((story_id, step_no)): Path<(DbId, i32)>,
) -> AppResult<Json<DataResponse<RedeemOutcome>>> {
    let outcome = ChapterGate::new(&state.pool, &state.pricing)
        .unlock(user.user_id, &user.plan, story_id, step_no)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// GET /api/v1/stories/{story_id}/chapters/unlocked
///
/// The caller's permanent grants for this story, in chapter order.
pub async fn unlocked(
    State(state): State<AppState>,
    user: AuthUser,
    Path(story_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<ChapterUnlock>>>> {
    let unlocks = ChapterUnlockRepo::list_for_story(&state.pool, user.user_id, story_id).await?;
    Ok(Json(DataResponse { data: unlocks }))
}
