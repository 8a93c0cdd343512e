//! User entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use taleforge_core::types::{DbId, Timestamp};

/// Full user row from the `users` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub plan: String,
    /// Cached balance. Only the coin ledger writes this column.
    pub coins: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub plan: Option<String>,
}
