//! Read-only access to published story graphs.

use sqlx::PgPool;
use taleforge_core::types::DbId;

use crate::models::story::{Story, StoryChoice, StoryNode};

const STORY_COLUMNS: &str = "id, title, author_id, published_version_id, created_at, updated_at";
const NODE_COLUMNS: &str = "id, version_id, step_no, is_start, title, content";
const CHOICE_COLUMNS: &str = "id, from_node_id, to_node_id, genre_key, label, sort_order";

pub struct StoryGraphRepo;

impl StoryGraphRepo {
    /// Find a story by its primary key.
    pub async fn find_story(pool: &PgPool, id: DbId) -> Result<Option<Story>, sqlx::Error> {
        let query = format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = $1");
        sqlx::query_as::<_, Story>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a node by its primary key.
    pub async fn find_node(pool: &PgPool, id: DbId) -> Result<Option<StoryNode>, sqlx::Error> {
        let query = format!("SELECT {NODE_COLUMNS} FROM story_nodes WHERE id = $1");
        sqlx::query_as::<_, StoryNode>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The unique start node of a published version.
    pub async fn find_start_node(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<Option<StoryNode>, sqlx::Error> {
        let query = format!(
            "SELECT {NODE_COLUMNS} FROM story_nodes
             WHERE version_id = $1 AND is_start = true"
        );
        sqlx::query_as::<_, StoryNode>(&query)
            .bind(version_id)
            .fetch_optional(pool)
            .await
    }

    /// Outgoing choices of a node in display order.
    pub async fn list_choices_from(
        pool: &PgPool,
        node_id: DbId,
    ) -> Result<Vec<StoryChoice>, sqlx::Error> {
        let query = format!(
            "SELECT {CHOICE_COLUMNS} FROM story_choices
             WHERE from_node_id = $1
             ORDER BY sort_order ASC, id ASC"
        );
        sqlx::query_as::<_, StoryChoice>(&query)
            .bind(node_id)
            .fetch_all(pool)
            .await
    }

    /// The edge leaving `from_node_id` for `genre_key`, if any.
    pub async fn find_choice(
        pool: &PgPool,
        from_node_id: DbId,
        genre_key: &str,
    ) -> Result<Option<StoryChoice>, sqlx::Error> {
        let query = format!(
            "SELECT {CHOICE_COLUMNS} FROM story_choices
             WHERE from_node_id = $1 AND genre_key = $2"
        );
        sqlx::query_as::<_, StoryChoice>(&query)
            .bind(from_node_id)
            .bind(genre_key)
            .fetch_optional(pool)
            .await
    }
}
