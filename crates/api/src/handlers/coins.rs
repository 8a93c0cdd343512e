//! Handlers for a reader's own coin balance and ledger.

use axum::extract::{Query, State};
use axum::Json;
use taleforge_core::error::CoreError;
use taleforge_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use taleforge_db::models::coin::{CoinBalance, CoinTransaction};
use taleforge_db::repositories::CoinLedgerRepo;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/coins
pub async fn balance(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<CoinBalance>>> {
    let coins = CoinLedgerRepo::get_balance(&state.pool, user.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: user.user_id,
        })?;
    Ok(Json(DataResponse {
        data: CoinBalance {
            user_id: user.user_id,
            coins,
        },
    }))
}

/// GET /api/v1/coins/transactions
///
/// Newest first.
pub async fn transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<CoinTransaction>>>> {
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
    let offset = clamp_offset(params.offset);
    let txs = CoinLedgerRepo::list_transactions(&state.pool, user.user_id, limit, offset).await?;
    Ok(Json(DataResponse { data: txs }))
}
