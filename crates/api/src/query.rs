//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Pagination parameters (`?limit=&offset=`).
///
/// Clamped with `taleforge_core::pagination` before reaching a repository.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for `POST /stories/{story_id}/runs`.
#[derive(Debug, Default, Deserialize)]
pub struct StartRunParams {
    /// Abandon the resumable run and start over.
    #[serde(default)]
    pub restart: bool,
}
