//! Shared fixtures for repository integration tests.
//!
//! Story graphs are produced by the publish pipeline in production; tests
//! insert them directly.

#![allow(dead_code)]

use sqlx::PgPool;
use taleforge_core::types::DbId;
use taleforge_db::models::user::{CreateUser, User};
use taleforge_db::repositories::UserRepo;

/// A five-chapter story:
///
/// ```text
/// start(1) --adventure--> adventure(2) --mystery--> chapter3(3) --horror--> chapter4(4) --comedy--> chapter5(5)
///          \--romance---> romance(2)   (dead end)
/// ```
pub struct StoryFixture {
    pub story_id: DbId,
    pub version_id: DbId,
    pub start: DbId,
    pub adventure: DbId,
    pub romance: DbId,
    pub chapter3: DbId,
    pub chapter4: DbId,
    pub chapter5: DbId,
}

pub async fn new_user(pool: &PgPool, username: &str, plan: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            plan: Some(plan.to_string()),
        },
    )
    .await
    .expect("user creation should succeed")
}

async fn insert_node(pool: &PgPool, version_id: DbId, step_no: i32, is_start: bool, title: &str) -> DbId {
    let row: (DbId,) = sqlx::query_as(
        "INSERT INTO story_nodes (version_id, step_no, is_start, title, content)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(version_id)
    .bind(step_no)
    .bind(is_start)
    .bind(title)
    .bind(format!("{title} content"))
    .fetch_one(pool)
    .await
    .expect("node insert should succeed");
    row.0
}

async fn insert_choice(pool: &PgPool, from: DbId, to: DbId, genre_key: &str) {
    sqlx::query(
        "INSERT INTO story_choices (from_node_id, to_node_id, genre_key, label)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(from)
    .bind(to)
    .bind(genre_key)
    .bind(format!("Go {genre_key}"))
    .execute(pool)
    .await
    .expect("choice insert should succeed");
}

pub async fn seed_story(pool: &PgPool, title: &str) -> StoryFixture {
    let (story_id,): (DbId,) =
        sqlx::query_as("INSERT INTO stories (title) VALUES ($1) RETURNING id")
            .bind(title)
            .fetch_one(pool)
            .await
            .expect("story insert should succeed");
    let (version_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO story_versions (story_id, version_number) VALUES ($1, 1) RETURNING id",
    )
    .bind(story_id)
    .fetch_one(pool)
    .await
    .expect("version insert should succeed");
    sqlx::query("UPDATE stories SET published_version_id = $2 WHERE id = $1")
        .bind(story_id)
        .bind(version_id)
        .execute(pool)
        .await
        .expect("publish should succeed");

    let start = insert_node(pool, version_id, 1, true, "Opening").await;
    let adventure = insert_node(pool, version_id, 2, false, "Into the Wilds").await;
    let romance = insert_node(pool, version_id, 2, false, "A Chance Meeting").await;
    let chapter3 = insert_node(pool, version_id, 3, false, "The Locked Door").await;
    let chapter4 = insert_node(pool, version_id, 4, false, "Whispers").await;
    let chapter5 = insert_node(pool, version_id, 5, false, "Finale").await;

    insert_choice(pool, start, adventure, "adventure").await;
    insert_choice(pool, start, romance, "romance").await;
    insert_choice(pool, adventure, chapter3, "mystery").await;
    insert_choice(pool, chapter3, chapter4, "horror").await;
    insert_choice(pool, chapter4, chapter5, "comedy").await;

    StoryFixture {
        story_id,
        version_id,
        start,
        adventure,
        romance,
        chapter3,
        chapter4,
        chapter5,
    }
}

/// Overwrite a reward rule.
pub async fn set_rule(pool: &PgPool, key: &str, coins: i64, enabled: bool, daily_cap: Option<i64>) {
    sqlx::query(
        "INSERT INTO reward_rules (key, label, coins, enabled, daily_cap)
         VALUES ($1, $1, $2, $3, $4)
         ON CONFLICT (key) DO UPDATE
         SET coins = EXCLUDED.coins, enabled = EXCLUDED.enabled,
             daily_cap = EXCLUDED.daily_cap, updated_at = NOW()",
    )
    .bind(key)
    .bind(coins)
    .bind(enabled)
    .bind(daily_cap)
    .execute(pool)
    .await
    .expect("rule upsert should succeed");
}

pub async fn balance(pool: &PgPool, user_id: DbId) -> i64 {
    taleforge_db::repositories::CoinLedgerRepo::get_balance(pool, user_id)
        .await
        .unwrap()
        .expect("user should exist")
}

pub async fn transaction_count(pool: &PgPool, user_id: DbId) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coin_transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap();
    row.0
}
