//! Taleforge event bus and reward crediting.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope.
//! - [`RewardListener`]: background service that turns reader activity
//!   events into coin ledger credits.

pub mod bus;
pub mod rewards;

pub use bus::{EventBus, PlatformEvent};
pub use rewards::RewardListener;
