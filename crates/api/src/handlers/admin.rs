//! Handlers for the administrative surface: reader provisioning and the
//! ledger.
//!
//! All handlers require the `admin` role via [`RequireAdmin`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use taleforge_core::coin_ledger::CreditOutcome;
use taleforge_core::roles;
use taleforge_core::types::DbId;
use taleforge_db::models::coin::{AdjustRequest, CreditRequest, LedgerEntry, RewardRule};
use taleforge_db::models::user::{CreateUser, User};
use taleforge_db::repositories::{CoinLedgerRepo, RewardRuleRepo, UserRepo};

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/admin/users
///
/// Provision a reader row for an identity issued elsewhere. The new user
/// starts at zero coins. 409 if the username is taken.
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<DataResponse<User>>)> {
    roles::validate_new_user(&input.username, input.plan.as_deref())?;
    let user = UserRepo::create(&state.pool, &input).await?;
    tracing::info!(
        admin_id = admin.user_id,
        user_id = user.id,
        plan = %user.plan,
        "Reader provisioned"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: user })))
}

/// POST /api/v1/admin/coins/credit
///
/// Best-effort reward credit. Always 200; the `outcome` tag tells which
/// branch fired.
pub async fn credit(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CreditRequest>,
) -> AppResult<Json<DataResponse<CreditOutcome>>> {
    tracing::debug!(
        admin_id = admin.user_id,
        user_id = input.user_id,
        rule_key = %input.rule_key,
        "Manual reward credit"
    );
    let outcome = CoinLedgerRepo::credit_if_eligible(&state.pool, &input).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/admin/coins/adjust
pub async fn adjust(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<AdjustRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<LedgerEntry>>)> {
    let entry = CoinLedgerRepo::adjust(&state.pool, &input).await?;
    tracing::info!(
        admin_id = admin.user_id,
        user_id = input.user_id,
        transaction_id = entry.transaction.id,
        "Admin adjustment recorded"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: entry })))
}

/// POST /api/v1/admin/coins/transactions/{id}/refund
pub async fn refund(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<LedgerEntry>>)> {
    let entry = CoinLedgerRepo::refund(&state.pool, id).await?;
    tracing::info!(
        admin_id = admin.user_id,
        source_transaction_id = id,
        refund_transaction_id = entry.transaction.id,
        "Admin refund recorded"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: entry })))
}

/// GET /api/v1/admin/reward-rules
pub async fn reward_rules(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<RewardRule>>>> {
    let rules = RewardRuleRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: rules }))
}
