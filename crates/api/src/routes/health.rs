//! Liveness for load balancers. Mounted at `/health`, outside `/api/v1`,
//! and needs no token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when Postgres does not answer. Runs and the
    /// ledger are unusable while degraded.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
}

/// GET /health
///
/// 200 when the database answers, 503 otherwise.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_healthy = match taleforge_db::health_check(&state.pool).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Database health check failed");
            false
        }
    };

    let (code, status) = if db_healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            db_healthy,
        }),
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
