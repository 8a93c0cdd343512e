//! The coin ledger: append-only `coin_transactions` plus the cached
//! `users.coins` balance.
//!
//! Every balance mutation goes through [`CoinLedgerRepo::apply_entry`], which
//! inserts the ledger row and moves the balance in the caller's transaction.
//! Each public write locks the user's row first (`SELECT ... FOR UPDATE`), so
//! the dedup check, the daily-cap sum, the insert, and the balance update are
//! serialised per user and commit or roll back together.

use chrono::{TimeDelta, Utc};
use sqlx::{PgConnection, PgPool};
use taleforge_core::coin_ledger::{
    self, CreditOutcome, DedupKey, RedeemOutcome, TransactionType, REASON_REFUND,
};
use taleforge_core::error::CoreError;
use taleforge_core::types::{DbId, Timestamp};

use crate::error::LedgerError;
use crate::is_unique_violation;
use crate::models::coin::{
    AdjustRequest, BalanceDrift, CoinTransaction, CreditRequest, LedgerEntry,
};
use crate::repositories::{ChapterUnlockRepo, RewardRuleRepo};

/// Column list for coin transaction queries.
const COLUMNS: &str = "id, user_id, type, coins, reason, stable_id, refund_of, meta, created_at";

/// Unique index backing the typed dedup key.
const DEDUP_INDEX: &str = "uq_coin_transactions_dedup";

/// Unique index backing one-refund-per-transaction.
const REFUND_INDEX: &str = "uq_coin_transactions_refund_of";

/// A ledger row about to be written.
struct NewEntry<'a> {
    user_id: DbId,
    tx_type: TransactionType,
    coins: i64,
    reason: &'a str,
    stable_id: Option<&'a str>,
    refund_of: Option<DbId>,
    meta: serde_json::Value,
    created_at: Timestamp,
}

/// Ledger reads and the only write path for coin balances.
pub struct CoinLedgerRepo;

impl CoinLedgerRepo {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current cached balance, or `None` if the user does not exist.
    pub async fn get_balance(pool: &PgPool, user_id: DbId) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT coins FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    /// Find a ledger entry by ID.
    pub async fn find_transaction(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CoinTransaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM coin_transactions WHERE id = $1");
        sqlx::query_as::<_, CoinTransaction>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's ledger entries, newest first.
    pub async fn list_transactions(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CoinTransaction>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM coin_transactions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, CoinTransaction>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Credit
    // -----------------------------------------------------------------------

    /// Credit a reward if its rule allows it.
    ///
    /// Missing or disabled rules, a reached daily cap, and an already-credited
    /// trigger are all successes with a distinct [`CreditOutcome`].
    pub async fn credit_if_eligible(
        pool: &PgPool,
        input: &CreditRequest,
    ) -> Result<CreditOutcome, LedgerError> {
        Self::credit_if_eligible_at(pool, input, Utc::now()).await
    }

    /// [`credit_if_eligible`](Self::credit_if_eligible) with an explicit clock.
    ///
    /// The daily cap is evaluated over the UTC calendar day containing `now`,
    /// and the ledger entry is stamped with `now`.
    pub async fn credit_if_eligible_at(
        pool: &PgPool,
        input: &CreditRequest,
        now: Timestamp,
    ) -> Result<CreditOutcome, LedgerError> {
        coin_ledger::validate_reason(&input.reason)?;

        let Some(rule) = RewardRuleRepo::find_by_key(pool, &input.rule_key).await? else {
            tracing::debug!(rule_key = %input.rule_key, "Reward rule not found, skipping credit");
            return Ok(CreditOutcome::RuleInactive);
        };
        if !coin_ledger::rule_is_active(rule.enabled, rule.coins) {
            tracing::debug!(rule_key = %rule.key, "Reward rule inactive, skipping credit");
            return Ok(CreditOutcome::RuleInactive);
        }

        let key = DedupKey::new(input.user_id, input.reason.clone(), input.stable_id.clone());

        let mut tx = pool.begin().await?;
        let balance = Self::lock_balance(&mut tx, input.user_id).await?;

        if Self::dedup_exists(&mut tx, TransactionType::Earn, &key).await? {
            tracing::debug!(
                user_id = key.user_id,
                reason = %key.reason,
                stable_id = %key.stable_id,
                "Reward already credited"
            );
            return Ok(CreditOutcome::DuplicateSkipped);
        }

        if let Some(cap) = rule.daily_cap {
            let used_today = Self::earned_on_day(&mut tx, input.user_id, &input.reason, now).await?;
            if !coin_ledger::cap_allows(used_today, rule.coins, Some(cap)) {
                tracing::debug!(
                    user_id = input.user_id,
                    reason = %input.reason,
                    used_today,
                    daily_cap = cap,
                    "Daily reward cap reached"
                );
                return Ok(CreditOutcome::CapReached {
                    used_today,
                    daily_cap: cap,
                });
            }
        }

        coin_ledger::apply_delta(balance, rule.coins)?;

        let entry = NewEntry {
            user_id: input.user_id,
            tx_type: TransactionType::Earn,
            coins: rule.coins,
            reason: &input.reason,
            stable_id: Some(&input.stable_id),
            refund_of: None,
            meta: input.meta.clone().unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
        };

        let Some((transaction, balance)) = Self::apply_entry(&mut tx, entry).await? else {
            return Ok(CreditOutcome::DuplicateSkipped);
        };
        tx.commit().await?;

        tracing::info!(
            user_id = input.user_id,
            rule_key = %rule.key,
            reason = %input.reason,
            coins = rule.coins,
            balance,
            "Reward credited"
        );

        Ok(CreditOutcome::Credited {
            transaction_id: transaction.id,
            coins: transaction.coins,
            balance,
        })
    }

    // -----------------------------------------------------------------------
    // Adjust / refund
    // -----------------------------------------------------------------------

    /// Apply an administrative adjustment of either sign.
    ///
    /// Fails with `InsufficientCoins` if the balance would go negative.
    pub async fn adjust(pool: &PgPool, input: &AdjustRequest) -> Result<LedgerEntry, LedgerError> {
        coin_ledger::validate_adjustment(input.delta, &input.reason)?;

        let mut tx = pool.begin().await?;
        let balance = Self::lock_balance(&mut tx, input.user_id).await?;
        coin_ledger::apply_delta(balance, input.delta)?;

        let entry = NewEntry {
            user_id: input.user_id,
            tx_type: TransactionType::Adjust,
            coins: input.delta,
            reason: &input.reason,
            stable_id: None,
            refund_of: None,
            meta: input.meta.clone().unwrap_or_else(|| serde_json::json!({})),
            created_at: Utc::now(),
        };
        let (transaction, balance) = Self::apply_entry(&mut tx, entry)
            .await?
            .ok_or_else(|| CoreError::Internal("Adjustment collided with a dedup key".into()))?;
        tx.commit().await?;

        tracing::info!(
            user_id = input.user_id,
            delta = input.delta,
            reason = %input.reason,
            balance,
            "Coins adjusted"
        );

        Ok(LedgerEntry {
            transaction,
            balance,
        })
    }

    /// Reverse a prior transaction with an `adjust` entry of opposite sign.
    ///
    /// Each transaction can be refunded once; refunds themselves cannot be
    /// refunded. Chapter unlocks paid for by a refunded redemption remain.
    pub async fn refund(pool: &PgPool, transaction_id: DbId) -> Result<LedgerEntry, LedgerError> {
        let source = Self::find_transaction(pool, transaction_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "CoinTransaction",
                id: transaction_id,
            })?;
        if source.refund_of.is_some() {
            return Err(CoreError::Validation(format!(
                "Transaction {transaction_id} is itself a refund"
            ))
            .into());
        }
        let delta = coin_ledger::refund_delta(transaction_id, source.coins)?;

        let mut tx = pool.begin().await?;
        let balance = Self::lock_balance(&mut tx, source.user_id).await?;

        let already: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM coin_transactions WHERE refund_of = $1)",
        )
        .bind(transaction_id)
        .fetch_one(&mut *tx)
        .await?;
        if already.0 {
            return Err(CoreError::AlreadyRefunded { transaction_id }.into());
        }

        coin_ledger::apply_delta(balance, delta)?;

        let entry = NewEntry {
            user_id: source.user_id,
            tx_type: TransactionType::Adjust,
            coins: delta,
            reason: REASON_REFUND,
            stable_id: None,
            refund_of: Some(transaction_id),
            meta: serde_json::json!({ "refund_of": transaction_id, "source_type": source.tx_type }),
            created_at: Utc::now(),
        };
        let (transaction, balance) = match Self::apply_entry(&mut tx, entry).await {
            Ok(Some(written)) => written,
            Ok(None) => {
                return Err(CoreError::Internal("Refund collided with a dedup key".into()).into())
            }
            Err(e) if is_unique_violation(&e, REFUND_INDEX) => {
                return Err(CoreError::AlreadyRefunded { transaction_id }.into())
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        tracing::info!(
            user_id = source.user_id,
            transaction_id,
            delta,
            balance,
            "Transaction refunded"
        );

        Ok(LedgerEntry {
            transaction,
            balance,
        })
    }

    // -----------------------------------------------------------------------
    // Redeem
    // -----------------------------------------------------------------------

    /// Pay `coins` for a chapter and record the permanent unlock in one unit
    /// of work.
    ///
    /// The balance is re-validated under the row lock; a redemption that
    /// would go negative fails with `InsufficientCoins` and writes nothing.
    pub async fn redeem_chapter(
        pool: &PgPool,
        user_id: DbId,
        story_id: DbId,
        chapter_number: i32,
        coins: i64,
    ) -> Result<RedeemOutcome, LedgerError> {
        if coins <= 0 {
            return Ok(RedeemOutcome::NotRequired);
        }

        let mut tx = pool.begin().await?;
        let balance = Self::lock_balance(&mut tx, user_id).await?;

        if ChapterUnlockRepo::exists_on(&mut tx, user_id, story_id, chapter_number).await? {
            return Ok(RedeemOutcome::AlreadyUnlocked);
        }

        coin_ledger::apply_delta(balance, -coins)?;

        let key = DedupKey::chapter_unlock(user_id, story_id, chapter_number);
        let entry = NewEntry {
            user_id,
            tx_type: TransactionType::Redeem,
            coins: -coins,
            reason: &key.reason,
            stable_id: Some(&key.stable_id),
            refund_of: None,
            meta: serde_json::json!({ "story_id": story_id, "chapter_number": chapter_number }),
            created_at: Utc::now(),
        };
        let Some((transaction, balance)) = Self::apply_entry(&mut tx, entry).await? else {
            return Ok(RedeemOutcome::AlreadyUnlocked);
        };
        ChapterUnlockRepo::insert_on(&mut tx, user_id, story_id, chapter_number, transaction.id)
            .await?;
        tx.commit().await?;

        tracing::info!(
            user_id,
            story_id,
            chapter_number,
            coins,
            balance,
            "Chapter unlocked"
        );

        Ok(RedeemOutcome::Unlocked {
            transaction_id: transaction.id,
            coins: transaction.coins,
            balance,
        })
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Recompute cached balances from the ledger and repair any drift.
    ///
    /// Candidates are found with a plain read; each repair then re-checks the
    /// user under the row lock so a concurrent ledger write is never lost.
    pub async fn reconcile_balances(pool: &PgPool) -> Result<Vec<BalanceDrift>, sqlx::Error> {
        let candidates: Vec<(DbId,)> = sqlx::query_as(
            "SELECT u.id
             FROM users u
             LEFT JOIN coin_transactions t ON t.user_id = u.id
             GROUP BY u.id, u.coins
             HAVING u.coins <> COALESCE(SUM(t.coins), 0)",
        )
        .fetch_all(pool)
        .await?;

        let mut repaired = Vec::new();
        for (user_id,) in candidates {
            let mut tx = pool.begin().await?;
            let cached: Option<(i64,)> =
                sqlx::query_as("SELECT coins FROM users WHERE id = $1 FOR UPDATE")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let Some((cached,)) = cached else { continue };
            let ledger = Self::ledger_total_on(&mut tx, user_id).await?;

            if cached == ledger {
                continue;
            }
            if ledger < 0 {
                tracing::error!(user_id, ledger, "Ledger total is negative, not repairing");
                continue;
            }

            sqlx::query("UPDATE users SET coins = $2, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .bind(ledger)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::warn!(user_id, cached, ledger, "Repaired drifted coin balance");
            repaired.push(BalanceDrift {
                user_id,
                cached,
                ledger,
            });
        }
        Ok(repaired)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Lock the user's balance row for the rest of the transaction.
    async fn lock_balance(conn: &mut PgConnection, user_id: DbId) -> Result<i64, LedgerError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT coins FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;
        row.map(|r| r.0).ok_or_else(|| {
            CoreError::NotFound {
                entity: "User",
                id: user_id,
            }
            .into()
        })
    }

    async fn dedup_exists(
        conn: &mut PgConnection,
        tx_type: TransactionType,
        key: &DedupKey,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM coin_transactions
                WHERE user_id = $1 AND type = $2 AND reason = $3 AND stable_id = $4
             )",
        )
        .bind(key.user_id)
        .bind(tx_type.as_str())
        .bind(&key.reason)
        .bind(&key.stable_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }

    /// Coins earned for `reason` on the UTC day containing `now`.
    async fn earned_on_day(
        conn: &mut PgConnection,
        user_id: DbId,
        reason: &str,
        now: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        let day_start = coin_ledger::utc_day_start(now);
        let day_end = day_start + TimeDelta::days(1);
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(coins), 0)::BIGINT FROM coin_transactions
             WHERE user_id = $1 AND type = $2 AND reason = $3
               AND created_at >= $4 AND created_at < $5",
        )
        .bind(user_id)
        .bind(TransactionType::Earn.as_str())
        .bind(reason)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }

    async fn ledger_total_on(conn: &mut PgConnection, user_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(coins), 0)::BIGINT FROM coin_transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }

    /// Insert a ledger row and move the cached balance by the same amount.
    ///
    /// Returns `None` when the row collides with an existing dedup key, in
    /// which case the balance is untouched.
    async fn apply_entry(
        conn: &mut PgConnection,
        entry: NewEntry<'_>,
    ) -> Result<Option<(CoinTransaction, i64)>, sqlx::Error> {
        let query = format!(
            "INSERT INTO coin_transactions
                (user_id, type, coins, reason, stable_id, refund_of, meta, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, type, reason, stable_id) WHERE stable_id IS NOT NULL
             DO NOTHING
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, CoinTransaction>(&query)
            .bind(entry.user_id)
            .bind(entry.tx_type.as_str())
            .bind(entry.coins)
            .bind(entry.reason)
            .bind(entry.stable_id)
            .bind(entry.refund_of)
            .bind(&entry.meta)
            .bind(entry.created_at)
            .fetch_optional(&mut *conn)
            .await;

        let transaction = match inserted {
            Ok(Some(t)) => t,
            Ok(None) => return Ok(None),
            Err(e) if is_unique_violation(&e, DEDUP_INDEX) => return Ok(None),
            Err(e) => return Err(e),
        };

        let (balance,): (i64,) = sqlx::query_as(
            "UPDATE users SET coins = coins + $2, updated_at = NOW()
             WHERE id = $1
             RETURNING coins",
        )
        .bind(entry.user_id)
        .bind(entry.coins)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Some((transaction, balance)))
    }
}
