use taleforge_core::error::CoreError;

/// Error returned by ledger operations that can fail on a business rule as
/// well as on the database.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
