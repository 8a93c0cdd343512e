//! PostgreSQL persistence for Taleforge: connection pool, migrations, row
//! models, and repositories.
//!
//! [`repositories::CoinLedgerRepo`] is the only code that writes
//! `users.coins`; every other component reads balances through it.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// `true` if `err` is a unique violation on the named constraint or index.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
