use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A choice was already recorded for this step; steps are immutable.
    #[error("Step {step_no} of run {run_id} has already been chosen")]
    AlreadyChosen { run_id: DbId, step_no: i32 },

    /// No edge leaves the current node with the requested genre.
    #[error("No choice '{genre_key}' leads from the current node")]
    InvalidChoice { genre_key: String },

    #[error("Run {run_id} is already completed")]
    RunCompleted { run_id: DbId },

    /// The run was replaced by a restart and is read-only.
    #[error("Run {run_id} was replaced by a newer run of the same story")]
    RunSuperseded { run_id: DbId },

    /// A debit would take the balance below zero.
    #[error("Insufficient coins: {required} required, {available} available")]
    InsufficientCoins { required: i64, available: i64 },

    #[error("Transaction {transaction_id} has already been refunded")]
    AlreadyRefunded { transaction_id: DbId },
}
