pub mod admin;
pub mod coins;
pub mod health;
pub mod runs;
pub mod stories;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /stories/{story_id}/runs                          start or resume (POST, ?restart)
/// /stories/{story_id}/chapters/{step_no}/unlock     peek (GET), redeem (POST)
/// /stories/{story_id}/chapters/unlocked             own grants for the story
///
/// /runs/{run_id}/current                            current node or lock signal
/// /runs/{run_id}/choose                             take a choice (POST)
/// /runs/{run_id}/rating                             rate current node (POST)
/// /runs/{run_id}/finish                             complete the run (POST)
/// /runs/{run_id}/history                            choices taken
///
/// /coins                                            own balance
/// /coins/transactions                               own ledger (?limit, ?offset)
///
/// /admin/users                                      provision a reader (POST)
/// /admin/coins/credit                               reward credit (POST)
/// /admin/coins/adjust                               balance adjustment (POST)
/// /admin/coins/transactions/{id}/refund             refund (POST)
/// /admin/reward-rules                               list reward rules
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/stories", stories::router())
        .nest("/runs", runs::router())
        .nest("/coins", coins::router())
        .nest("/admin", admin::router())
}
