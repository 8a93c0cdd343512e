//! Repository for the `chapter_unlocks` table.
//!
//! Unlock rows are only inserted by
//! [`CoinLedgerRepo::redeem_chapter`](super::CoinLedgerRepo::redeem_chapter),
//! in the same transaction as the redemption that pays for them.

use sqlx::{PgConnection, PgPool};
use taleforge_core::types::DbId;

use crate::models::coin::ChapterUnlock;

const COLUMNS: &str = "id, user_id, story_id, chapter_number, transaction_id, created_at";

pub struct ChapterUnlockRepo;

impl ChapterUnlockRepo {
    /// Whether a permanent grant exists for this chapter.
    pub async fn exists(
        pool: &PgPool,
        user_id: DbId,
        story_id: DbId,
        chapter_number: i32,
    ) -> Result<bool, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::exists_on(&mut conn, user_id, story_id, chapter_number).await
    }

    /// List a user's unlocked chapters of one story, in chapter order.
    pub async fn list_for_story(
        pool: &PgPool,
        user_id: DbId,
        story_id: DbId,
    ) -> Result<Vec<ChapterUnlock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chapter_unlocks
             WHERE user_id = $1 AND story_id = $2
             ORDER BY chapter_number ASC"
        );
        sqlx::query_as::<_, ChapterUnlock>(&query)
            .bind(user_id)
            .bind(story_id)
            .fetch_all(pool)
            .await
    }

    pub(crate) async fn exists_on(
        conn: &mut PgConnection,
        user_id: DbId,
        story_id: DbId,
        chapter_number: i32,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM chapter_unlocks
                WHERE user_id = $1 AND story_id = $2 AND chapter_number = $3
             )",
        )
        .bind(user_id)
        .bind(story_id)
        .bind(chapter_number)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }

    pub(crate) async fn insert_on(
        conn: &mut PgConnection,
        user_id: DbId,
        story_id: DbId,
        chapter_number: i32,
        transaction_id: DbId,
    ) -> Result<ChapterUnlock, sqlx::Error> {
        let query = format!(
            "INSERT INTO chapter_unlocks (user_id, story_id, chapter_number, transaction_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChapterUnlock>(&query)
            .bind(user_id)
            .bind(story_id)
            .bind(chapter_number)
            .bind(transaction_id)
            .fetch_one(&mut *conn)
            .await
    }
}
