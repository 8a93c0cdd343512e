//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-row writes open their own
//! transaction so each call is a single unit of work.

pub mod chapter_unlock_repo;
pub mod coin_ledger_repo;
pub mod reward_rule_repo;
pub mod story_graph_repo;
pub mod story_run_repo;
pub mod user_repo;

pub use chapter_unlock_repo::ChapterUnlockRepo;
pub use coin_ledger_repo::CoinLedgerRepo;
pub use reward_rule_repo::RewardRuleRepo;
pub use story_graph_repo::StoryGraphRepo;
pub use story_run_repo::{ChoiceCommit, StoryRunRepo};
pub use user_repo::UserRepo;
