//! Integration tests for the coin ledger.
//!
//! Covers idempotent crediting, daily caps, non-negative balances,
//! chapter redemption, refunds, and balance reconciliation.

mod common;

use assert_matches::assert_matches;
use chrono::{TimeDelta, TimeZone, Utc};
use common::{balance, new_user, seed_story, set_rule, transaction_count};
use sqlx::PgPool;
use taleforge_core::coin_ledger::{CreditOutcome, RedeemOutcome, RULE_CHAPTER_COMPLETE};
use taleforge_core::error::CoreError;
use taleforge_core::roles::PLAN_FREE;
use taleforge_db::error::LedgerError;
use taleforge_db::models::coin::{AdjustRequest, CreditRequest};
use taleforge_db::repositories::{ChapterUnlockRepo, CoinLedgerRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn credit(user_id: i64, rule_key: &str, reason: &str, stable_id: &str) -> CreditRequest {
    CreditRequest {
        user_id,
        rule_key: rule_key.to_string(),
        reason: reason.to_string(),
        stable_id: stable_id.to_string(),
        meta: None,
    }
}

fn adjust(user_id: i64, delta: i64) -> AdjustRequest {
    AdjustRequest {
        user_id,
        delta,
        reason: "support".to_string(),
        meta: None,
    }
}

// ---------------------------------------------------------------------------
// Credit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_credit_is_idempotent(pool: PgPool) {
    let user = new_user(&pool, "idem", PLAN_FREE).await;
    let req = credit(user.id, RULE_CHAPTER_COMPLETE, RULE_CHAPTER_COMPLETE, "run:1:node:1");

    let first = CoinLedgerRepo::credit_if_eligible(&pool, &req).await.unwrap();
    assert_matches!(first, CreditOutcome::Credited { coins: 5, balance: 5, .. });

    let second = CoinLedgerRepo::credit_if_eligible(&pool, &req).await.unwrap();
    assert_eq!(second, CreditOutcome::DuplicateSkipped);

    assert_eq!(transaction_count(&pool, user.id).await, 1);
    assert_eq!(balance(&pool, user.id).await, 5);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_duplicate_credits_apply_once(pool: PgPool) {
    let user = new_user(&pool, "racer", PLAN_FREE).await;
    let req = credit(user.id, "story_complete", "story_complete", "run:42");

    let (a, b) = tokio::join!(
        CoinLedgerRepo::credit_if_eligible(&pool, &req),
        CoinLedgerRepo::credit_if_eligible(&pool, &req),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let credited = outcomes
        .iter()
        .filter(|o| matches!(o, CreditOutcome::Credited { .. }))
        .count();
    assert_eq!(credited, 1, "exactly one concurrent credit may win");
    assert!(outcomes.contains(&CreditOutcome::DuplicateSkipped));

    assert_eq!(transaction_count(&pool, user.id).await, 1);
    assert_eq!(balance(&pool, user.id).await, 20);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_or_disabled_rule_is_noop(pool: PgPool) {
    let user = new_user(&pool, "norule", PLAN_FREE).await;

    let missing = CoinLedgerRepo::credit_if_eligible(&pool, &credit(user.id, "nope", "nope", "x"))
        .await
        .unwrap();
    assert_eq!(missing, CreditOutcome::RuleInactive);

    set_rule(&pool, "like_milestone", 10, false, None).await;
    let disabled = CoinLedgerRepo::credit_if_eligible(
        &pool,
        &credit(user.id, "like_milestone", "like_milestone", "story:1:100"),
    )
    .await
    .unwrap();
    assert_eq!(disabled, CreditOutcome::RuleInactive);

    set_rule(&pool, "view_milestone", 0, true, None).await;
    let zero = CoinLedgerRepo::credit_if_eligible(
        &pool,
        &credit(user.id, "view_milestone", "view_milestone", "story:1:1000"),
    )
    .await
    .unwrap();
    assert_eq!(zero, CreditOutcome::RuleInactive);

    assert_eq!(transaction_count(&pool, user.id).await, 0);
    assert_eq!(balance(&pool, user.id).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_daily_cap_blocks_sixth_credit_and_resets_next_day(pool: PgPool) {
    let user = new_user(&pool, "capped", PLAN_FREE).await;
    set_rule(&pool, "daily_read", 1, true, Some(5)).await;

    let day1 = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
    for i in 0..5 {
        let req = credit(user.id, "daily_read", "daily_read", &format!("d1:{i}"));
        let outcome = CoinLedgerRepo::credit_if_eligible_at(&pool, &req, day1 + TimeDelta::minutes(i))
            .await
            .unwrap();
        assert_matches!(outcome, CreditOutcome::Credited { coins: 1, .. });
    }

    let sixth = credit(user.id, "daily_read", "daily_read", "d1:5");
    let outcome = CoinLedgerRepo::credit_if_eligible_at(&pool, &sixth, day1 + TimeDelta::hours(10))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CreditOutcome::CapReached {
            used_today: 5,
            daily_cap: 5
        }
    );
    assert_eq!(transaction_count(&pool, user.id).await, 5);
    assert_eq!(balance(&pool, user.id).await, 5);

    let day2 = day1 + TimeDelta::days(1);
    let outcome = CoinLedgerRepo::credit_if_eligible_at(&pool, &sixth, day2).await.unwrap();
    assert_matches!(outcome, CreditOutcome::Credited { coins: 1, balance: 6, .. });
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_credit_for_unknown_user_is_not_found(pool: PgPool) {
    let err = CoinLedgerRepo::credit_if_eligible(&pool, &credit(999_999, "story_complete", "story_complete", "run:1"))
        .await
        .unwrap_err();
    assert_matches!(err, LedgerError::Core(CoreError::NotFound { entity: "User", .. }));
}

// ---------------------------------------------------------------------------
// Adjust
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_adjust_moves_balance_both_ways(pool: PgPool) {
    let user = new_user(&pool, "adjusted", PLAN_FREE).await;

    let up = CoinLedgerRepo::adjust(&pool, &adjust(user.id, 150)).await.unwrap();
    assert_eq!(up.balance, 150);
    assert_eq!(up.transaction.tx_type, "adjust");

    let down = CoinLedgerRepo::adjust(&pool, &adjust(user.id, -50)).await.unwrap();
    assert_eq!(down.balance, 100);
    assert_eq!(balance(&pool, user.id).await, 100);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_adjust_cannot_go_negative(pool: PgPool) {
    let user = new_user(&pool, "overdrawn", PLAN_FREE).await;
    CoinLedgerRepo::adjust(&pool, &adjust(user.id, 30)).await.unwrap();

    let err = CoinLedgerRepo::adjust(&pool, &adjust(user.id, -31)).await.unwrap_err();
    assert_matches!(
        err,
        LedgerError::Core(CoreError::InsufficientCoins {
            required: 31,
            available: 30
        })
    );
    assert_eq!(balance(&pool, user.id).await, 30);
    assert_eq!(transaction_count(&pool, user.id).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_adjust_rejects_deltas_outside_bigint(pool: PgPool) {
    let user = new_user(&pool, "extreme", PLAN_FREE).await;

    let err = CoinLedgerRepo::adjust(&pool, &adjust(user.id, i64::MIN)).await.unwrap_err();
    assert_matches!(err, LedgerError::Core(CoreError::Validation(_)));

    CoinLedgerRepo::adjust(&pool, &adjust(user.id, 10)).await.unwrap();
    let err = CoinLedgerRepo::adjust(&pool, &adjust(user.id, i64::MAX)).await.unwrap_err();
    assert_matches!(err, LedgerError::Core(CoreError::Validation(_)));

    assert_eq!(balance(&pool, user.id).await, 10);
    assert_eq!(transaction_count(&pool, user.id).await, 1);
}

// ---------------------------------------------------------------------------
// Redeem
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_redeem_with_insufficient_balance_writes_nothing(pool: PgPool) {
    let user = new_user(&pool, "broke", PLAN_FREE).await;
    let story = seed_story(&pool, "Broke Story").await;
    CoinLedgerRepo::adjust(&pool, &adjust(user.id, 99)).await.unwrap();

    let err = CoinLedgerRepo::redeem_chapter(&pool, user.id, story.story_id, 3, 100)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        LedgerError::Core(CoreError::InsufficientCoins {
            required: 100,
            available: 99
        })
    );

    assert_eq!(balance(&pool, user.id).await, 99);
    assert_eq!(transaction_count(&pool, user.id).await, 1);
    assert!(!ChapterUnlockRepo::exists(&pool, user.id, story.story_id, 3).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_redeem_records_unlock_once(pool: PgPool) {
    let user = new_user(&pool, "buyer", PLAN_FREE).await;
    let story = seed_story(&pool, "Buyer Story").await;
    CoinLedgerRepo::adjust(&pool, &adjust(user.id, 250)).await.unwrap();

    let first = CoinLedgerRepo::redeem_chapter(&pool, user.id, story.story_id, 3, 100)
        .await
        .unwrap();
    assert_matches!(first, RedeemOutcome::Unlocked { coins: -100, balance: 150, .. });
    assert!(ChapterUnlockRepo::exists(&pool, user.id, story.story_id, 3).await.unwrap());

    let second = CoinLedgerRepo::redeem_chapter(&pool, user.id, story.story_id, 3, 100)
        .await
        .unwrap();
    assert_eq!(second, RedeemOutcome::AlreadyUnlocked);
    assert_eq!(balance(&pool, user.id).await, 150);

    let unlocks = ChapterUnlockRepo::list_for_story(&pool, user.id, story.story_id)
        .await
        .unwrap();
    assert_eq!(unlocks.len(), 1);
    assert_eq!(unlocks[0].chapter_number, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_redeems_never_overdraw(pool: PgPool) {
    let user = new_user(&pool, "double", PLAN_FREE).await;
    let story = seed_story(&pool, "Double Story").await;
    CoinLedgerRepo::adjust(&pool, &adjust(user.id, 100)).await.unwrap();

    let (a, b) = tokio::join!(
        CoinLedgerRepo::redeem_chapter(&pool, user.id, story.story_id, 3, 100),
        CoinLedgerRepo::redeem_chapter(&pool, user.id, story.story_id, 4, 100),
    );
    let succeeded = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Ok(RedeemOutcome::Unlocked { .. })))
        .count();
    assert_eq!(succeeded, 1, "only one chapter can be paid for with 100 coins");
    assert_eq!(balance(&pool, user.id).await, 0);
}

// ---------------------------------------------------------------------------
// Refund
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refund_of_redeem_restores_coins_once(pool: PgPool) {
    let user = new_user(&pool, "refunded", PLAN_FREE).await;
    let story = seed_story(&pool, "Refund Story").await;
    CoinLedgerRepo::adjust(&pool, &adjust(user.id, 100)).await.unwrap();

    let RedeemOutcome::Unlocked { transaction_id, .. } =
        CoinLedgerRepo::redeem_chapter(&pool, user.id, story.story_id, 3, 100)
            .await
            .unwrap()
    else {
        panic!("redeem should unlock");
    };
    assert_eq!(balance(&pool, user.id).await, 0);

    let refund = CoinLedgerRepo::refund(&pool, transaction_id).await.unwrap();
    assert_eq!(refund.transaction.coins, 100);
    assert_eq!(refund.transaction.refund_of, Some(transaction_id));
    assert_eq!(refund.balance, 100);

    let err = CoinLedgerRepo::refund(&pool, transaction_id).await.unwrap_err();
    assert_matches!(err, LedgerError::Core(CoreError::AlreadyRefunded { .. }));
    assert_eq!(balance(&pool, user.id).await, 100);

    // The unlock survives the refund.
    assert!(ChapterUnlockRepo::exists(&pool, user.id, story.story_id, 3).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refund_of_spent_credit_is_insufficient(pool: PgPool) {
    let user = new_user(&pool, "spent", PLAN_FREE).await;
    let granted = CoinLedgerRepo::adjust(&pool, &adjust(user.id, 40)).await.unwrap();
    CoinLedgerRepo::adjust(&pool, &adjust(user.id, -30)).await.unwrap();

    let err = CoinLedgerRepo::refund(&pool, granted.transaction.id).await.unwrap_err();
    assert_matches!(err, LedgerError::Core(CoreError::InsufficientCoins { .. }));
    assert_eq!(balance(&pool, user.id).await, 10);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refund_of_refund_is_rejected(pool: PgPool) {
    let user = new_user(&pool, "reref", PLAN_FREE).await;
    let granted = CoinLedgerRepo::adjust(&pool, &adjust(user.id, 40)).await.unwrap();
    let refund = CoinLedgerRepo::refund(&pool, granted.transaction.id).await.unwrap();

    let err = CoinLedgerRepo::refund(&pool, refund.transaction.id).await.unwrap_err();
    assert_matches!(err, LedgerError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refund_unknown_transaction_is_not_found(pool: PgPool) {
    let err = CoinLedgerRepo::refund(&pool, 123_456).await.unwrap_err();
    assert_matches!(err, LedgerError::Core(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reconcile_repairs_drifted_balance(pool: PgPool) {
    let drifted = new_user(&pool, "drifted", PLAN_FREE).await;
    let healthy = new_user(&pool, "healthy", PLAN_FREE).await;
    CoinLedgerRepo::adjust(&pool, &adjust(drifted.id, 70)).await.unwrap();
    CoinLedgerRepo::adjust(&pool, &adjust(healthy.id, 20)).await.unwrap();

    // Simulate a balance that went out of sync with the ledger.
    sqlx::query("UPDATE users SET coins = 5 WHERE id = $1")
        .bind(drifted.id)
        .execute(&pool)
        .await
        .unwrap();

    let repaired = CoinLedgerRepo::reconcile_balances(&pool).await.unwrap();
    assert_eq!(repaired.len(), 1);
    assert_eq!(repaired[0].user_id, drifted.id);
    assert_eq!(repaired[0].cached, 5);
    assert_eq!(repaired[0].ledger, 70);

    assert_eq!(balance(&pool, drifted.id).await, 70);
    assert_eq!(balance(&pool, healthy.id).await, 20);
    assert!(CoinLedgerRepo::reconcile_balances(&pool).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_transactions_listed_newest_first(pool: PgPool) {
    let user = new_user(&pool, "lister", PLAN_FREE).await;
    CoinLedgerRepo::adjust(&pool, &adjust(user.id, 10)).await.unwrap();
    CoinLedgerRepo::adjust(&pool, &adjust(user.id, 20)).await.unwrap();

    let txs = CoinLedgerRepo::list_transactions(&pool, user.id, 10, 0).await.unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].coins, 20);
    assert_eq!(txs[1].coins, 10);
}
