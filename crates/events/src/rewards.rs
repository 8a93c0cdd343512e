//! Reward crediting service.
//!
//! [`RewardListener`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and turns reader activity into coin ledger credits. Every credit carries
//! an explicit dedup key, so a replayed or duplicated event never pays twice.

use taleforge_core::coin_ledger::{
    CreditOutcome, DedupKey, RULE_CHAPTER_COMPLETE, RULE_LIKE_MILESTONE, RULE_STORY_COMPLETE,
    RULE_VIEW_MILESTONE,
};
use taleforge_db::error::LedgerError;
use taleforge_db::models::coin::CreditRequest;
use taleforge_db::repositories::CoinLedgerRepo;
use taleforge_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::{
    PlatformEvent, EVENT_CHAPTER_RATED, EVENT_LIKE_MILESTONE, EVENT_STORY_COMPLETED,
    EVENT_VIEW_MILESTONE,
};

/// Map an event to the credit it earns, if any.
///
/// Events without an actor, or missing the ids their dedup key needs, earn
/// nothing.
pub fn reward_for_event(event: &PlatformEvent) -> Option<CreditRequest> {
    let user_id = event.actor_user_id?;

    let (rule_key, key) = match event.event_type.as_str() {
        EVENT_CHAPTER_RATED => {
            let run_id = event.payload_id("run_id")?;
            let node_id = event.payload_id("node_id")?;
            (
                RULE_CHAPTER_COMPLETE,
                DedupKey::chapter_complete(user_id, run_id, node_id),
            )
        }
        EVENT_STORY_COMPLETED => {
            let run_id = event.payload_id("run_id")?;
            (RULE_STORY_COMPLETE, DedupKey::story_complete(user_id, run_id))
        }
        EVENT_LIKE_MILESTONE | EVENT_VIEW_MILESTONE => {
            let rule_key = if event.event_type == EVENT_LIKE_MILESTONE {
                RULE_LIKE_MILESTONE
            } else {
                RULE_VIEW_MILESTONE
            };
            let story_id = event.payload_id("story_id")?;
            let milestone = event.payload_id("milestone")?;
            (
                rule_key,
                DedupKey::milestone(user_id, rule_key, story_id, milestone),
            )
        }
        _ => return None,
    };

    Some(CreditRequest {
        user_id: key.user_id,
        rule_key: rule_key.to_string(),
        reason: key.reason,
        stable_id: key.stable_id,
        meta: Some(event.payload.clone()),
    })
}

/// Background service that credits rewards for bus events.
pub struct RewardListener;

impl RewardListener {
    /// Run the listener loop until the bus is closed.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::handle(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to credit reward"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Reward listener lagged, some events were not credited");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, reward listener shutting down");
                    break;
                }
            }
        }
    }

    /// Credit the reward for a single event.
    ///
    /// Returns `None` for events that earn nothing.
    pub async fn handle(
        pool: &DbPool,
        event: &PlatformEvent,
    ) -> Result<Option<CreditOutcome>, LedgerError> {
        let Some(request) = reward_for_event(event) else {
            return Ok(None);
        };
        let outcome = CoinLedgerRepo::credit_if_eligible(pool, &request).await?;
        Ok(Some(outcome))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
