//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` input DTOs where the core writes the table

pub mod coin;
pub mod story;
pub mod story_run;
pub mod user;
