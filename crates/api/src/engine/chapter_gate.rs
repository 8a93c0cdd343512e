//! Chapter access checks backed by the database.
//!
//! Wraps the pure [`unlock_gate::decide`] with the two reads it needs (the
//! unlock record and the balance) and exposes the explicit redeem call.

use serde::Serialize;
use sqlx::PgPool;
use taleforge_core::coin_ledger::RedeemOutcome;
use taleforge_core::error::CoreError;
use taleforge_core::story_run::validate_step_no;
use taleforge_core::types::DbId;
use taleforge_core::unlock_gate::{self, ChapterPricing, UnlockDecision};
use taleforge_db::repositories::{ChapterUnlockRepo, CoinLedgerRepo, StoryGraphRepo};

use crate::error::AppResult;

/// Lock signal returned in place of chapter content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedChapter {
    pub step_no: i32,
    pub required_coins: i64,
    pub available: i64,
}

impl LockedChapter {
    /// `Some` when `decision` denies access to `step_no`.
    pub fn from_decision(step_no: i32, decision: UnlockDecision) -> Option<Self> {
        match decision {
            UnlockDecision::Allowed => None,
            UnlockDecision::Locked {
                required_coins,
                available,
            } => Some(Self {
                step_no,
                required_coins,
                available,
            }),
        }
    }
}

/// Gate decision for one chapter of a story, as reported to clients.
#[derive(Debug, Serialize)]
pub struct ChapterAccess {
    pub story_id: DbId,
    pub step_no: i32,
    #[serde(flatten)]
    pub decision: UnlockDecision,
    /// Whether the reader could pay for the chapter right now.
    pub can_redeem: bool,
}

pub struct ChapterGate<'a> {
    pool: &'a PgPool,
    pricing: &'a ChapterPricing,
}

impl<'a> ChapterGate<'a> {
    pub fn new(pool: &'a PgPool, pricing: &'a ChapterPricing) -> Self {
        Self { pool, pricing }
    }

    /// Decide access to `step_no` of `story_id`.
    ///
    /// Readers who are never charged for the step skip both reads.
    pub async fn decide(
        &self,
        user_id: DbId,
        plan: &str,
        story_id: DbId,
        step_no: i32,
    ) -> AppResult<UnlockDecision> {
        if !unlock_gate::requires_payment(self.pricing, plan, step_no) {
            return Ok(UnlockDecision::Allowed);
        }
        let already_unlocked = ChapterUnlockRepo::exists(self.pool, user_id, story_id, step_no).await?;
        if already_unlocked {
            return Ok(UnlockDecision::Allowed);
        }
        let balance = CoinLedgerRepo::get_balance(self.pool, user_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "User",
                id: user_id,
            })?;
        Ok(unlock_gate::decide(
            self.pricing,
            plan,
            step_no,
            already_unlocked,
            balance,
        ))
    }

    /// Peek at a chapter without paying for it.
    pub async fn access(
        &self,
        user_id: DbId,
        plan: &str,
        story_id: DbId,
        step_no: i32,
    ) -> AppResult<ChapterAccess> {
        validate_step_no(step_no)?;
        self.ensure_story(story_id).await?;
        let decision = self.decide(user_id, plan, story_id, step_no).await?;
        Ok(ChapterAccess {
            story_id,
            step_no,
            decision,
            can_redeem: decision.can_redeem(),
        })
    }

    /// Pay for a chapter and record the permanent unlock.
    ///
    /// Free chapters and non-free plans are `NotRequired`; the ledger
    /// re-validates the balance at commit time and fails with
    /// `InsufficientCoins` without writing anything.
    pub async fn unlock(
        &self,
        user_id: DbId,
        plan: &str,
        story_id: DbId,
        step_no: i32,
    ) -> AppResult<RedeemOutcome> {
        validate_step_no(step_no)?;
        self.ensure_story(story_id).await?;
        if !unlock_gate::requires_payment(self.pricing, plan, step_no) {
            return Ok(RedeemOutcome::NotRequired);
        }
        let coins = self.pricing.required_coins(step_no);
        let outcome =
            CoinLedgerRepo::redeem_chapter(self.pool, user_id, story_id, step_no, coins).await?;
        Ok(outcome)
    }

    async fn ensure_story(&self, story_id: DbId) -> AppResult<()> {
        StoryGraphRepo::find_story(self.pool, story_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Story",
                id: story_id,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_decision_has_no_lock() {
        assert_eq!(LockedChapter::from_decision(3, UnlockDecision::Allowed), None);
    }

    #[test]
    fn locked_decision_carries_price_and_balance() {
        let locked = LockedChapter::from_decision(
            4,
            UnlockDecision::Locked {
                required_coins: 100,
                available: 30,
            },
        )
        .unwrap();
        assert_eq!(locked.step_no, 4);
        assert_eq!(locked.required_coins, 100);
        assert_eq!(locked.available, 30);
    }

    #[test]
    fn access_flattens_decision() {
        let access = ChapterAccess {
            story_id: 1,
            step_no: 3,
            decision: UnlockDecision::Locked {
                required_coins: 100,
                available: 0,
            },
            can_redeem: false,
        };
        let json = serde_json::to_value(&access).unwrap();
        assert_eq!(json["status"], "locked");
        assert_eq!(json["required_coins"], 100);
        assert_eq!(json["step_no"], 3);
    }
}
