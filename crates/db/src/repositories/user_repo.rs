//! Repository for the `users` table.
//!
//! Identities are issued elsewhere; this only provisions the local row the
//! ledger hangs off. The `coins` column is never written here.

use sqlx::PgPool;
use taleforge_core::roles::PLAN_FREE;
use taleforge_core::types::DbId;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, plan, coins, created_at, updated_at";

/// Provisions users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user with a zero balance, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, plan)
             VALUES ($1, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(input.plan.as_deref().unwrap_or(PLAN_FREE))
            .fetch_one(pool)
            .await
    }
}
