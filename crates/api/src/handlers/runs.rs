//! Handlers for story runs.
//!
//! All handlers require an authenticated reader; runs belonging to other
//! users are reported as not found.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use taleforge_core::types::DbId;
use taleforge_db::models::story_run::{NodeRating, RunChoice, StoryRun};

use crate::engine::{CurrentNodeView, StartedRun, StoryRunEngine};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::StartRunParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /runs/{run_id}/choose`.
#[derive(Debug, Deserialize)]
pub struct ChooseRequest {
    pub genre_key: String,
}

/// Request body for `POST /runs/{run_id}/rating`.
#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i16,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/stories/{story_id}/runs
///
/// 201 with a new run, or 200 with the reader's open run.
pub async fn start(
    State(state): State<AppState>,
    user: AuthUser,
    Path(story_id): Path<DbId>,
    Query(params): Query<StartRunParams>,
) -> AppResult<(StatusCode, Json<DataResponse<StartedRun>>)> {
    let started = StoryRunEngine::new(&state)
        .start_run(user.user_id, story_id, params.restart)
        .await?;
    let status = if started.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DataResponse { data: started })))
}

/// GET /api/v1/runs/{run_id}/current
pub async fn current(
    State(state): State<AppState>,
    user: AuthUser,
    Path(run_id): Path<DbId>,
) -> AppResult<Json<DataResponse<CurrentNodeView>>> {
    let view = StoryRunEngine::new(&state)
        .get_current_node(run_id, user.user_id, &user.plan)
        .await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/runs/{run_id}/choose
pub async fn choose(
    State(state): State<AppState>,
    user: AuthUser,
    Path(run_id): Path<DbId>,
    Json(input): Json<ChooseRequest>,
) -> AppResult<Json<DataResponse<CurrentNodeView>>> {
    let view = StoryRunEngine::new(&state)
        .choose(run_id, user.user_id, &user.plan, &input.genre_key)
        .await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/runs/{run_id}/rating
pub async fn rate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(run_id): Path<DbId>,
    Json(input): Json<RatingRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<NodeRating>>)> {
    let rating = StoryRunEngine::new(&state)
        .submit_rating(run_id, user.user_id, &user.plan, input.rating)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: rating })))
}

/// POST /api/v1/runs/{run_id}/finish
pub async fn finish(
    State(state): State<AppState>,
    user: AuthUser,
    Path(run_id): Path<DbId>,
) -> AppResult<Json<DataResponse<StoryRun>>> {
    let run = StoryRunEngine::new(&state)
        .finish_run(run_id, user.user_id)
        .await?;
    Ok(Json(DataResponse { data: run }))
}

/// GET /api/v1/runs/{run_id}/history
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(run_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<RunChoice>>>> {
    let choices = StoryRunEngine::new(&state)
        .list_history(run_id, user.user_id)
        .await?;
    Ok(Json(DataResponse { data: choices }))
}
