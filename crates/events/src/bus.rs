//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`; the run engine publishes
//! [`PlatformEvent`]s and the reward listener consumes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taleforge_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// A reader rated the chapter they are on.
pub const EVENT_CHAPTER_RATED: &str = "chapter.rated";
/// A reader finished a run.
pub const EVENT_STORY_COMPLETED: &str = "story.completed";
/// A story crossed a like milestone; the actor is the author.
pub const EVENT_LIKE_MILESTONE: &str = "story.like_milestone";
/// A story crossed a view milestone; the actor is the author.
pub const EVENT_VIEW_MILESTONE: &str = "story.view_milestone";

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event.
///
/// Built with [`PlatformEvent::new`] plus the `with_*` builders, or with one
/// of the named constructors for events the reward listener understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"story.completed"`.
    pub event_type: String,

    /// Source entity kind (`"run"`, `"story"`).
    pub source_entity_type: Option<String>,

    pub source_entity_id: Option<DbId>,

    /// User the event is about. Rewards are credited to this user.
    pub actor_user_id: Option<DbId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// `chapter.rated` for `node_id` of `run_id`.
    pub fn chapter_rated(user_id: DbId, run_id: DbId, node_id: DbId, step_no: i32, rating: i16) -> Self {
        Self::new(EVENT_CHAPTER_RATED)
            .with_source("run", run_id)
            .with_actor(user_id)
            .with_payload(serde_json::json!({
                "run_id": run_id,
                "node_id": node_id,
                "step_no": step_no,
                "rating": rating,
            }))
    }

    /// `story.completed` for a finished run.
    pub fn story_completed(user_id: DbId, run_id: DbId, story_id: DbId) -> Self {
        Self::new(EVENT_STORY_COMPLETED)
            .with_source("run", run_id)
            .with_actor(user_id)
            .with_payload(serde_json::json!({
                "run_id": run_id,
                "story_id": story_id,
            }))
    }

    /// `story.like_milestone` / `story.view_milestone`, credited to the author.
    pub fn milestone(event_type: &str, author_id: DbId, story_id: DbId, milestone: i64) -> Self {
        Self::new(event_type)
            .with_source("story", story_id)
            .with_actor(author_id)
            .with_payload(serde_json::json!({
                "story_id": story_id,
                "milestone": milestone,
            }))
    }

    /// Integer field of the payload.
    pub fn payload_id(&self, field: &str) -> Option<i64> {
        self.payload.get(field).and_then(serde_json::Value::as_i64)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use taleforge_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::story_completed(1, 2, 3));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unread events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Events published with no subscribers are dropped.
    pub fn publish(&self, event: PlatformEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
