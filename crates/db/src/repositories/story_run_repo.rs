//! Repository for `story_runs`, `run_choices`, and `node_ratings`.
//!
//! Only [`StoryRunRepo::commit_choice`] moves a run's current node, and it
//! does so in the same transaction that appends the step's `run_choices`
//! row. The `(run_id, step_no)` unique constraint decides the winner when two
//! requests race on the same step.

use sqlx::PgPool;
use taleforge_core::types::DbId;

use crate::is_unique_violation;
use crate::models::story_run::{NewRunChoice, NodeRating, RunChoice, StoryRun};

const COLUMNS: &str = "id, user_id, story_id, version_id, current_node_id, is_completed, \
    superseded_at, completed_at, started_at, updated_at";

const CHOICE_COLUMNS: &str = "id, run_id, step_no, from_node_id, genre_key, to_node_id, created_at";

const RATING_COLUMNS: &str = "id, run_id, node_id, user_id, rating, created_at";

/// Unique index allowing one resumable run per (user, story).
const ACTIVE_RUN_INDEX: &str = "uq_story_runs_active";

/// Unique constraint locking a step once chosen.
const STEP_CONSTRAINT: &str = "uq_run_choices_step";

/// Outcome of [`StoryRunRepo::commit_choice`].
#[derive(Debug)]
pub enum ChoiceCommit {
    /// The choice was recorded and the run advanced.
    Committed(StoryRun),
    /// Another request already chose this step; nothing was written.
    AlreadyChosen,
    /// The run was completed in the meantime; nothing was written.
    RunCompleted,
    /// The run was replaced by a restart in the meantime; nothing was written.
    Superseded,
}

pub struct StoryRunRepo;

impl StoryRunRepo {
    /// Find a run by ID, only if it belongs to `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<StoryRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM story_runs WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, StoryRun>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// The user's resumable run of a story, if any.
    pub async fn find_active(
        pool: &PgPool,
        user_id: DbId,
        story_id: DbId,
    ) -> Result<Option<StoryRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM story_runs
             WHERE user_id = $1 AND story_id = $2
               AND NOT is_completed AND superseded_at IS NULL"
        );
        sqlx::query_as::<_, StoryRun>(&query)
            .bind(user_id)
            .bind(story_id)
            .fetch_optional(pool)
            .await
    }

    /// Start a run at `start_node_id`, or resume the existing one.
    ///
    /// With `restart`, an existing resumable run is marked superseded and a
    /// fresh run replaces it, all in one transaction. Returns the run and
    /// whether it was newly created.
    pub async fn start(
        pool: &PgPool,
        user_id: DbId,
        story_id: DbId,
        version_id: DbId,
        start_node_id: DbId,
        restart: bool,
    ) -> Result<(StoryRun, bool), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "SELECT {COLUMNS} FROM story_runs
             WHERE user_id = $1 AND story_id = $2
               AND NOT is_completed AND superseded_at IS NULL
             FOR UPDATE"
        );
        let existing = sqlx::query_as::<_, StoryRun>(&query)
            .bind(user_id)
            .bind(story_id)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(run) = existing {
            if !restart {
                return Ok((run, false));
            }
            sqlx::query(
                "UPDATE story_runs SET superseded_at = NOW(), updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(run.id)
            .execute(&mut *tx)
            .await?;
        }

        let query = format!(
            "INSERT INTO story_runs (user_id, story_id, version_id, current_node_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, StoryRun>(&query)
            .bind(user_id)
            .bind(story_id)
            .bind(version_id)
            .bind(start_node_id)
            .fetch_one(&mut *tx)
            .await;

        match inserted {
            Ok(run) => {
                tx.commit().await?;
                Ok((run, true))
            }
            // A concurrent start won the race; resume its run.
            Err(e) if is_unique_violation(&e, ACTIVE_RUN_INDEX) => {
                drop(tx);
                let run = Self::find_active(pool, user_id, story_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((run, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Append a choice and advance the run, as one unit of work.
    ///
    /// The run row is locked first. If the run has moved off
    /// `choice.from_node_id`, or the step's unique constraint fires, the
    /// caller lost the race and nothing is written.
    pub async fn commit_choice(
        pool: &PgPool,
        choice: &NewRunChoice,
    ) -> Result<ChoiceCommit, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<(DbId, bool, bool)> = sqlx::query_as(
            "SELECT current_node_id, is_completed, superseded_at IS NOT NULL
             FROM story_runs WHERE id = $1 FOR UPDATE",
        )
        .bind(choice.run_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (current_node_id, is_completed, is_superseded) =
            locked.ok_or(sqlx::Error::RowNotFound)?;

        if is_completed {
            return Ok(ChoiceCommit::RunCompleted);
        }
        if is_superseded {
            return Ok(ChoiceCommit::Superseded);
        }
        if current_node_id != choice.from_node_id {
            return Ok(ChoiceCommit::AlreadyChosen);
        }

        let inserted = sqlx::query(
            "INSERT INTO run_choices (run_id, step_no, from_node_id, genre_key, to_node_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(choice.run_id)
        .bind(choice.step_no)
        .bind(choice.from_node_id)
        .bind(&choice.genre_key)
        .bind(choice.to_node_id)
        .execute(&mut *tx)
        .await;
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e, STEP_CONSTRAINT) => {
                return Ok(ChoiceCommit::AlreadyChosen)
            }
            Err(e) => return Err(e),
        }

        let query = format!(
            "UPDATE story_runs SET current_node_id = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let run = sqlx::query_as::<_, StoryRun>(&query)
            .bind(choice.run_id)
            .bind(choice.to_node_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ChoiceCommit::Committed(run))
    }

    /// The choice recorded for a step, if any.
    pub async fn find_choice_for_step(
        pool: &PgPool,
        run_id: DbId,
        step_no: i32,
    ) -> Result<Option<RunChoice>, sqlx::Error> {
        let query = format!(
            "SELECT {CHOICE_COLUMNS} FROM run_choices WHERE run_id = $1 AND step_no = $2"
        );
        sqlx::query_as::<_, RunChoice>(&query)
            .bind(run_id)
            .bind(step_no)
            .fetch_optional(pool)
            .await
    }

    /// Full choice history of a run, in step order.
    pub async fn list_choices(pool: &PgPool, run_id: DbId) -> Result<Vec<RunChoice>, sqlx::Error> {
        let query = format!(
            "SELECT {CHOICE_COLUMNS} FROM run_choices WHERE run_id = $1 ORDER BY step_no ASC"
        );
        sqlx::query_as::<_, RunChoice>(&query)
            .bind(run_id)
            .fetch_all(pool)
            .await
    }

    /// Record a rating for a node of a run.
    ///
    /// Returns `None` if the node was already rated in this run.
    pub async fn insert_rating(
        pool: &PgPool,
        run_id: DbId,
        node_id: DbId,
        user_id: DbId,
        rating: i16,
    ) -> Result<Option<NodeRating>, sqlx::Error> {
        let query = format!(
            "INSERT INTO node_ratings (run_id, node_id, user_id, rating)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (run_id, node_id) DO NOTHING
             RETURNING {RATING_COLUMNS}"
        );
        sqlx::query_as::<_, NodeRating>(&query)
            .bind(run_id)
            .bind(node_id)
            .bind(user_id)
            .bind(rating)
            .fetch_optional(pool)
            .await
    }

    /// Whether a node has been rated in this run.
    pub async fn has_rating(pool: &PgPool, run_id: DbId, node_id: DbId) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM node_ratings WHERE run_id = $1 AND node_id = $2)",
        )
        .bind(run_id)
        .bind(node_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Mark a run completed. Returns `None` if it was already completed or
    /// has been superseded.
    pub async fn complete(pool: &PgPool, run_id: DbId) -> Result<Option<StoryRun>, sqlx::Error> {
        let query = format!(
            "UPDATE story_runs
             SET is_completed = true, completed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND NOT is_completed AND superseded_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StoryRun>(&query)
            .bind(run_id)
            .fetch_optional(pool)
            .await
    }
}
