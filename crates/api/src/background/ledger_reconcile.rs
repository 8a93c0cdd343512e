//! Periodic coin balance reconciliation.
//!
//! Recomputes every cached `users.coins` from the ledger and repairs drift
//! through [`CoinLedgerRepo::reconcile_balances`]. Drift should never occur;
//! a repair is logged as a warning by the repository.

use std::time::Duration;

use sqlx::PgPool;
use taleforge_db::repositories::CoinLedgerRepo;
use tokio_util::sync::CancellationToken;

/// Run the reconciliation loop until `cancel` is triggered.
///
/// The first pass runs immediately.
pub async fn run(pool: PgPool, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Ledger reconciliation job started");

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Ledger reconciliation job stopping");
                break;
            }
            _ = interval.tick() => {
                match CoinLedgerRepo::reconcile_balances(&pool).await {
                    Ok(repaired) if repaired.is_empty() => {
                        tracing::debug!("Ledger reconciliation: all balances consistent");
                    }
                    Ok(repaired) => {
                        tracing::warn!(repaired = repaired.len(), "Ledger reconciliation: repaired balances");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Ledger reconciliation failed");
                    }
                }
            }
        }
    }
}
