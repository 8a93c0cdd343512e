use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use taleforge_core::error::CoreError;
use taleforge_db::error::LedgerError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and raw sqlx failures. Ledger
/// errors fold into these two. Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `taleforge_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Core(core) => AppError::Core(core),
            LedgerError::Database(db) => AppError::Database(db),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
                CoreError::AlreadyChosen { .. } => {
                    (StatusCode::CONFLICT, "ALREADY_CHOSEN", core.to_string())
                }
                CoreError::InvalidChoice { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "INVALID_CHOICE",
                    core.to_string(),
                ),
                CoreError::RunCompleted { .. } => {
                    (StatusCode::CONFLICT, "RUN_COMPLETED", core.to_string())
                }
                CoreError::RunSuperseded { .. } => {
                    (StatusCode::CONFLICT, "RUN_SUPERSEDED", core.to_string())
                }
                CoreError::InsufficientCoins { .. } => (
                    StatusCode::PAYMENT_REQUIRED,
                    "INSUFFICIENT_COINS",
                    core.to_string(),
                ),
                CoreError::AlreadyRefunded { .. } => {
                    (StatusCode::CONFLICT, "ALREADY_REFUNDED", core.to_string())
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });

        // Clients render "N more coins needed" from these.
        if let AppError::Core(CoreError::InsufficientCoins {
            required,
            available,
        }) = &self
        {
            body["required_coins"] = json!(required);
            body["available"] = json!(available);
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
