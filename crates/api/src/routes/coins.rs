use axum::routing::get;
use axum::Router;

use crate::handlers::coins;
use crate::state::AppState;

/// Routes mounted at `/coins`.
///
/// ```text
/// GET    /                 -> balance
/// GET    /transactions     -> transactions
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(coins::balance))
        .route("/transactions", get(coins::transactions))
}
