//! Chapter unlock gate: decides whether a reader may see a chapter.
//!
//! The decision is a pure function of the reader's plan, the chapter's step
//! number, whether a permanent unlock record exists, and the reader's current
//! coin balance. Prices live in a [`ChapterPricing`] table so they can be
//! retuned without touching the run state machine.
//!
//! Viewing and paying are separate operations. A [`UnlockDecision::Locked`]
//! result never consumes coins; the caller redeems explicitly and the ledger
//! re-validates the balance at commit time.

use serde::Serialize;

use crate::error::CoreError;
use crate::roles::PLAN_FREE;
use crate::story_run::{MAX_STEP_NO, MIN_STEP_NO};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default flat price for every paid chapter.
pub const DEFAULT_CHAPTER_UNLOCK_COINS: i64 = 100;

/// Default number of leading chapters that are free for everyone.
pub const DEFAULT_FREE_CHAPTERS: i32 = 2;

// ---------------------------------------------------------------------------
// Pricing table
// ---------------------------------------------------------------------------

/// Coin cost per chapter, indexed by `step_no - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPricing {
    costs: Vec<i64>,
}

impl ChapterPricing {
    /// Build a table from explicit per-step costs.
    ///
    /// Exactly one entry per step is required and no entry may be negative.
    pub fn new(costs: Vec<i64>) -> Result<Self, CoreError> {
        if costs.len() != MAX_STEP_NO as usize {
            return Err(CoreError::Validation(format!(
                "Chapter pricing needs {MAX_STEP_NO} entries, got {}",
                costs.len()
            )));
        }
        if let Some(bad) = costs.iter().find(|c| **c < 0) {
            return Err(CoreError::Validation(format!(
                "Chapter price must not be negative, got {bad}"
            )));
        }
        Ok(Self { costs })
    }

    /// First `free_chapters` steps cost nothing, the rest cost `price`.
    pub fn flat(free_chapters: i32, price: i64) -> Result<Self, CoreError> {
        if !(0..=MAX_STEP_NO).contains(&free_chapters) {
            return Err(CoreError::Validation(format!(
                "Free chapter count must be between 0 and {MAX_STEP_NO}, got {free_chapters}"
            )));
        }
        let costs = (MIN_STEP_NO..=MAX_STEP_NO)
            .map(|step| if step <= free_chapters { 0 } else { price })
            .collect();
        Self::new(costs)
    }

    /// Coins required to unlock `step_no`.
    ///
    /// Steps past the end of the table are charged the last entry, so a
    /// mis-numbered node can never become free by accident.
    pub fn required_coins(&self, step_no: i32) -> i64 {
        if step_no < MIN_STEP_NO {
            return 0;
        }
        let idx = ((step_no - MIN_STEP_NO) as usize).min(self.costs.len() - 1);
        self.costs[idx]
    }
}

impl Default for ChapterPricing {
    fn default() -> Self {
        let costs = (MIN_STEP_NO..=MAX_STEP_NO)
            .map(|step| {
                if step <= DEFAULT_FREE_CHAPTERS {
                    0
                } else {
                    DEFAULT_CHAPTER_UNLOCK_COINS
                }
            })
            .collect();
        Self { costs }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome of the gate for one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnlockDecision {
    Allowed,
    Locked { required_coins: i64, available: i64 },
}

impl UnlockDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, UnlockDecision::Allowed)
    }

    /// `true` when the chapter is locked but the reader could pay for it now.
    pub fn can_redeem(&self) -> bool {
        match self {
            UnlockDecision::Allowed => false,
            UnlockDecision::Locked {
                required_coins,
                available,
            } => available >= required_coins,
        }
    }
}

/// Whether `plan` is charged for `step_no` at all.
pub fn requires_payment(pricing: &ChapterPricing, plan: &str, step_no: i32) -> bool {
    plan == PLAN_FREE && pricing.required_coins(step_no) > 0
}

/// Decide whether a reader may access a chapter.
///
/// - Any plan other than `free` is always allowed.
/// - Chapters priced at zero (the leading free chapters) are always allowed.
/// - A permanent unlock record allows the chapter regardless of balance.
/// - Otherwise the chapter is locked and the result reports the price and
///   the balance so the client can render how many coins are missing.
pub fn decide(
    pricing: &ChapterPricing,
    plan: &str,
    step_no: i32,
    already_unlocked: bool,
    balance: i64,
) -> UnlockDecision {
    if !requires_payment(pricing, plan, step_no) || already_unlocked {
        return UnlockDecision::Allowed;
    }
    UnlockDecision::Locked {
        required_coins: pricing.required_coins(step_no),
        available: balance,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::PLAN_PREMIUM;
    use assert_matches::assert_matches;

    // -- pricing --------------------------------------------------------------

    #[test]
    fn default_pricing_has_two_free_chapters() {
        let p = ChapterPricing::default();
        assert_eq!(p.required_coins(1), 0);
        assert_eq!(p.required_coins(2), 0);
        assert_eq!(p.required_coins(3), DEFAULT_CHAPTER_UNLOCK_COINS);
        assert_eq!(p.required_coins(5), DEFAULT_CHAPTER_UNLOCK_COINS);
    }

    #[test]
    fn flat_pricing_matches_default() {
        let p = ChapterPricing::flat(DEFAULT_FREE_CHAPTERS, DEFAULT_CHAPTER_UNLOCK_COINS).unwrap();
        assert_eq!(p, ChapterPricing::default());
    }

    #[test]
    fn steps_past_table_use_last_price() {
        let p = ChapterPricing::new(vec![0, 0, 10, 20, 30]).unwrap();
        assert_eq!(p.required_coins(9), 30);
        assert_eq!(p.required_coins(0), 0);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(ChapterPricing::new(vec![0, 0, 100]).is_err());
    }

    #[test]
    fn rejects_negative_price() {
        assert!(ChapterPricing::new(vec![0, 0, -1, 100, 100]).is_err());
    }

    #[test]
    fn rejects_free_count_out_of_range() {
        assert!(ChapterPricing::flat(-1, 100).is_err());
        assert!(ChapterPricing::flat(MAX_STEP_NO + 1, 100).is_err());
    }

    // -- decide ---------------------------------------------------------------

    #[test]
    fn paid_plan_always_allowed() {
        let p = ChapterPricing::default();
        for step in MIN_STEP_NO..=MAX_STEP_NO {
            assert_eq!(decide(&p, PLAN_PREMIUM, step, false, 0), UnlockDecision::Allowed);
        }
    }

    #[test]
    fn first_two_chapters_free_on_free_plan() {
        let p = ChapterPricing::default();
        assert_eq!(decide(&p, PLAN_FREE, 1, false, 0), UnlockDecision::Allowed);
        assert_eq!(decide(&p, PLAN_FREE, 2, false, 0), UnlockDecision::Allowed);
    }

    #[test]
    fn free_plan_zero_balance_locked_on_chapter_three() {
        let p = ChapterPricing::default();
        let d = decide(&p, PLAN_FREE, 3, false, 0);
        assert_eq!(
            d,
            UnlockDecision::Locked {
                required_coins: 100,
                available: 0
            }
        );
        assert!(!d.can_redeem());
    }

    #[test]
    fn unlock_record_allows_regardless_of_balance() {
        let p = ChapterPricing::default();
        assert_eq!(decide(&p, PLAN_FREE, 4, true, 0), UnlockDecision::Allowed);
    }

    #[test]
    fn sufficient_balance_is_still_locked_but_redeemable() {
        let p = ChapterPricing::default();
        let d = decide(&p, PLAN_FREE, 5, false, 150);
        assert_matches!(
            d,
            UnlockDecision::Locked {
                required_coins: 100,
                available: 150
            }
        );
        assert!(d.can_redeem());
        assert!(!d.is_allowed());
    }

    #[test]
    fn locked_serializes_with_status_tag() {
        let d = UnlockDecision::Locked {
            required_coins: 100,
            available: 40,
        };
        let json = serde_json::to_value(d).unwrap();
        assert_eq!(json["status"], "locked");
        assert_eq!(json["required_coins"], 100);
        assert_eq!(json["available"], 40);
    }
}
