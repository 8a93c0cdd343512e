use std::sync::Arc;

use taleforge_core::unlock_gate::ChapterPricing;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub pool: taleforge_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Run engine events (ratings, completions) feed the reward listener.
    pub event_bus: Arc<taleforge_events::EventBus>,
    /// Chapter price table, built once from config.
    pub pricing: Arc<ChapterPricing>,
}
