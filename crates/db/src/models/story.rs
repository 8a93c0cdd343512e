//! Published story graph models.
//!
//! Rows in these tables are produced by the import/publish pipeline and are
//! read-only to the run engine.

use serde::Serialize;
use sqlx::FromRow;
use taleforge_core::types::{DbId, Timestamp};

/// A story row from the `stories` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Story {
    pub id: DbId,
    pub title: String,
    pub author_id: Option<DbId>,
    pub published_version_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A narrative unit at a fixed depth of the graph.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StoryNode {
    pub id: DbId,
    pub version_id: DbId,
    pub step_no: i32,
    pub is_start: bool,
    pub title: String,
    pub content: String,
}

/// A labelled edge between two nodes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StoryChoice {
    pub id: DbId,
    pub from_node_id: DbId,
    pub to_node_id: DbId,
    pub genre_key: String,
    pub label: String,
    pub sort_order: i32,
}
