//! Coin ledger models: transactions, reward rules, and chapter unlocks.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taleforge_core::types::{DbId, Timestamp};

/// An entry of the append-only `coin_transactions` ledger.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CoinTransaction {
    pub id: DbId,
    pub user_id: DbId,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub tx_type: String,
    pub coins: i64,
    pub reason: String,
    pub stable_id: Option<String>,
    pub refund_of: Option<DbId>,
    pub meta: serde_json::Value,
    pub created_at: Timestamp,
}

/// Administrator-managed reward configuration.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RewardRule {
    pub key: String,
    pub label: String,
    pub coins: i64,
    pub enabled: bool,
    pub daily_cap: Option<i64>,
    pub meta: serde_json::Value,
    pub updated_at: Timestamp,
}

/// A permanent chapter grant.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChapterUnlock {
    pub id: DbId,
    pub user_id: DbId,
    pub story_id: DbId,
    pub chapter_number: i32,
    pub transaction_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// Input for a best-effort reward credit.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditRequest {
    pub user_id: DbId,
    pub rule_key: String,
    pub reason: String,
    /// Stable identifier of the trigger; with `user_id` and `reason` it forms
    /// the dedup key.
    pub stable_id: String,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// Input for an administrative balance adjustment.
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustRequest {
    pub user_id: DbId,
    pub delta: i64,
    pub reason: String,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// A user's balance as reported to clients.
#[derive(Debug, Clone, Serialize)]
pub struct CoinBalance {
    pub user_id: DbId,
    pub coins: i64,
}

/// A ledger entry that was written, with the balance it produced.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub transaction: CoinTransaction,
    pub balance: i64,
}

/// A user whose cached balance disagreed with the ledger and was repaired.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BalanceDrift {
    pub user_id: DbId,
    pub cached: i64,
    pub ledger: i64,
}
