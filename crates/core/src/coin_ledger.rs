//! Coin ledger rules: transaction types, reward keys, dedup keys, daily caps,
//! and the typed outcomes of ledger operations.
//!
//! The ledger is an append-only log of coin-affecting events; the per-user
//! balance is a projection of that log. Persistence lives in the `db` crate;
//! every decision that does not need a database round trip lives here.

use chrono::{DurationRound, TimeDelta};
use serde::Serialize;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Transaction types
// ---------------------------------------------------------------------------

pub const TX_EARN: &str = "earn";
pub const TX_REDEEM: &str = "redeem";
pub const TX_ADJUST: &str = "adjust";

/// Kind of a ledger entry, stored as text in `coin_transactions.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Reward credit. Always positive.
    Earn,
    /// Spend on a chapter unlock. Always negative.
    Redeem,
    /// Administrative correction or refund. Either sign.
    Adjust,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Earn => TX_EARN,
            TransactionType::Redeem => TX_REDEEM,
            TransactionType::Adjust => TX_ADJUST,
        }
    }
}

// ---------------------------------------------------------------------------
// Reward rule keys and reasons
// ---------------------------------------------------------------------------

/// Credited once per rated chapter of a run.
pub const RULE_CHAPTER_COMPLETE: &str = "chapter_complete";
/// Credited once per finished run.
pub const RULE_STORY_COMPLETE: &str = "story_complete";
/// Credited when a story the user wrote crosses a like milestone.
pub const RULE_LIKE_MILESTONE: &str = "like_milestone";
/// Credited when a story the user wrote crosses a view milestone.
pub const RULE_VIEW_MILESTONE: &str = "view_milestone";

/// Reason recorded on chapter-unlock redemptions.
pub const REASON_CHAPTER_UNLOCK: &str = "chapter_unlock";
/// Reason recorded on refund adjustments.
pub const REASON_REFUND: &str = "refund";

/// Maximum allowed length for a ledger reason.
pub const MAX_REASON_LENGTH: usize = 100;

// ---------------------------------------------------------------------------
// Dedup key
// ---------------------------------------------------------------------------

/// Natural key that identifies a single reward trigger.
///
/// Stored in dedicated columns backed by a unique index, so two credits for
/// the same trigger collide regardless of how their JSON metadata is shaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DedupKey {
    pub user_id: DbId,
    pub reason: String,
    pub stable_id: String,
}

impl DedupKey {
    pub fn new(user_id: DbId, reason: impl Into<String>, stable_id: impl Into<String>) -> Self {
        Self {
            user_id,
            reason: reason.into(),
            stable_id: stable_id.into(),
        }
    }

    /// One credit per rated node of a run.
    pub fn chapter_complete(user_id: DbId, run_id: DbId, node_id: DbId) -> Self {
        Self::new(
            user_id,
            RULE_CHAPTER_COMPLETE,
            format!("run:{run_id}:node:{node_id}"),
        )
    }

    /// One credit per finished run.
    pub fn story_complete(user_id: DbId, run_id: DbId) -> Self {
        Self::new(user_id, RULE_STORY_COMPLETE, format!("run:{run_id}"))
    }

    /// One redemption per chapter of a story.
    pub fn chapter_unlock(user_id: DbId, story_id: DbId, step_no: i32) -> Self {
        Self::new(
            user_id,
            REASON_CHAPTER_UNLOCK,
            format!("story:{story_id}:chapter:{step_no}"),
        )
    }

    /// One credit per story milestone (`like_milestone` / `view_milestone`).
    pub fn milestone(user_id: DbId, rule_key: &str, story_id: DbId, milestone: i64) -> Self {
        Self::new(user_id, rule_key, format!("story:{story_id}:{milestone}"))
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a best-effort reward credit.
///
/// Every branch is a success from the caller's point of view; the tag lets
/// callers and tests see which one fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreditOutcome {
    Credited {
        transaction_id: DbId,
        coins: i64,
        balance: i64,
    },
    /// Rule missing, disabled, or worth no coins.
    RuleInactive,
    /// The daily cap for this reason would be exceeded.
    CapReached { used_today: i64, daily_cap: i64 },
    /// The same trigger was already credited.
    DuplicateSkipped,
}

/// Result of an explicit chapter unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedeemOutcome {
    Unlocked {
        transaction_id: DbId,
        coins: i64,
        balance: i64,
    },
    /// An unlock record already exists; nothing was charged.
    AlreadyUnlocked,
    /// The chapter is free for this reader; nothing was charged.
    NotRequired,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Whether a reward rule can grant anything at all.
pub fn rule_is_active(enabled: bool, coins: i64) -> bool {
    enabled && coins > 0
}

/// Whether a credit of `coins` fits under `daily_cap` given `used_today`.
///
/// `None` means the rule is uncapped.
pub fn cap_allows(used_today: i64, coins: i64, daily_cap: Option<i64>) -> bool {
    match daily_cap {
        Some(cap) => used_today + coins <= cap,
        None => true,
    }
}

/// Start of the UTC calendar day containing `now`.
pub fn utc_day_start(now: Timestamp) -> Timestamp {
    now.duration_trunc(TimeDelta::days(1)).unwrap_or(now)
}

/// Balance after applying `delta`, or `InsufficientCoins` if it would go
/// negative. Deltas that cannot be represented in a balance are rejected as
/// validation errors.
pub fn apply_delta(balance: i64, delta: i64) -> Result<i64, CoreError> {
    let out_of_range =
        || CoreError::Validation(format!("Coin delta {delta} is out of range"));
    let next = balance.checked_add(delta).ok_or_else(out_of_range)?;
    if next < 0 {
        return Err(CoreError::InsufficientCoins {
            required: delta.checked_neg().ok_or_else(out_of_range)?,
            available: balance,
        });
    }
    Ok(next)
}

/// Delta of a refund for a transaction worth `prior_coins`.
pub fn refund_delta(transaction_id: DbId, prior_coins: i64) -> Result<i64, CoreError> {
    if prior_coins == 0 {
        return Err(CoreError::Validation(format!(
            "Transaction {transaction_id} moved no coins and cannot be refunded"
        )));
    }
    prior_coins.checked_neg().ok_or_else(|| {
        CoreError::Validation(format!("Transaction {transaction_id} cannot be reversed"))
    })
}

/// Validate a ledger reason string.
pub fn validate_reason(reason: &str) -> Result<(), CoreError> {
    if reason.trim().is_empty() {
        return Err(CoreError::Validation("Reason must not be empty".to_string()));
    }
    if reason.len() > MAX_REASON_LENGTH {
        return Err(CoreError::Validation(format!(
            "Reason must not exceed {MAX_REASON_LENGTH} characters, got {}",
            reason.len()
        )));
    }
    Ok(())
}

/// Validate an administrative adjustment.
pub fn validate_adjustment(delta: i64, reason: &str) -> Result<(), CoreError> {
    if delta == 0 {
        return Err(CoreError::Validation(
            "Adjustment delta must not be zero".to_string(),
        ));
    }
    validate_reason(reason)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
