//! Run engine orchestration.
//!
//! [`story_run::StoryRunEngine`] advances readers through story graphs;
//! [`chapter_gate::ChapterGate`] decides and sells chapter access. Both sit
//! between the HTTP handlers and the repositories.

pub mod chapter_gate;
pub mod story_run;

pub use chapter_gate::{ChapterAccess, ChapterGate, LockedChapter};
pub use story_run::{CurrentNode, CurrentNodeView, StartedRun, StoryRunEngine};
