//! Story run models: the run itself, its choice history, and chapter ratings.

use serde::Serialize;
use sqlx::FromRow;
use taleforge_core::types::{DbId, Timestamp};

/// A run row from the `story_runs` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StoryRun {
    pub id: DbId,
    pub user_id: DbId,
    pub story_id: DbId,
    pub version_id: DbId,
    pub current_node_id: DbId,
    pub is_completed: bool,
    pub superseded_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StoryRun {
    /// `true` once a restart has replaced this run.
    pub fn is_superseded(&self) -> bool {
        self.superseded_at.is_some()
    }
}

/// One locked step of a run's history.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RunChoice {
    pub id: DbId,
    pub run_id: DbId,
    pub step_no: i32,
    pub from_node_id: DbId,
    pub genre_key: String,
    pub to_node_id: DbId,
    pub created_at: Timestamp,
}

/// Input for committing a transition.
#[derive(Debug, Clone)]
pub struct NewRunChoice {
    pub run_id: DbId,
    pub step_no: i32,
    pub from_node_id: DbId,
    pub genre_key: String,
    pub to_node_id: DbId,
}

/// A reader's rating of one node within a run.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NodeRating {
    pub id: DbId,
    pub run_id: DbId,
    pub node_id: DbId,
    pub user_id: DbId,
    pub rating: i16,
    pub created_at: Timestamp,
}
