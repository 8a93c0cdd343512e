//! Story run state rules.
//!
//! A run is a reader's walk through a story graph of fixed depth. The rules
//! here are the pure half of the run engine: step bounds, genre key and
//! rating validation, and the transition checks applied before the engine
//! commits a choice or finishes a run.

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Depth of the first chapter.
pub const MIN_STEP_NO: i32 = 1;

/// Depth of the deepest chapter a story graph may contain.
pub const MAX_STEP_NO: i32 = 5;

/// Maximum allowed length for a genre key.
pub const MAX_GENRE_KEY_LENGTH: usize = 64;

/// Lowest accepted chapter rating.
pub const MIN_RATING: i16 = 1;

/// Highest accepted chapter rating.
pub const MAX_RATING: i16 = 5;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a genre key submitted with a choice.
pub fn validate_genre_key(genre_key: &str) -> Result<(), CoreError> {
    let trimmed = genre_key.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Genre key must not be empty".to_string(),
        ));
    }
    if trimmed.len() != genre_key.len() {
        return Err(CoreError::Validation(
            "Genre key must not have leading or trailing whitespace".to_string(),
        ));
    }
    if genre_key.len() > MAX_GENRE_KEY_LENGTH {
        return Err(CoreError::Validation(format!(
            "Genre key must not exceed {MAX_GENRE_KEY_LENGTH} characters, got {}",
            genre_key.len()
        )));
    }
    Ok(())
}

/// Validate a chapter step number from a request path.
pub fn validate_step_no(step_no: i32) -> Result<(), CoreError> {
    if !(MIN_STEP_NO..=MAX_STEP_NO).contains(&step_no) {
        return Err(CoreError::Validation(format!(
            "Step number must be between {MIN_STEP_NO} and {MAX_STEP_NO}, got {step_no}"
        )));
    }
    Ok(())
}

/// Validate a chapter rating.
pub fn validate_rating(rating: i16) -> Result<(), CoreError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CoreError::Validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Transition rules
// ---------------------------------------------------------------------------

/// Reject any mutation of a completed run, or of a run replaced by a
/// restart. Superseded runs are history only.
pub fn ensure_open(
    run_id: DbId,
    is_completed: bool,
    is_superseded: bool,
) -> Result<(), CoreError> {
    if is_completed {
        return Err(CoreError::RunCompleted { run_id });
    }
    if is_superseded {
        return Err(CoreError::RunSuperseded { run_id });
    }
    Ok(())
}

/// Check that an edge moves strictly deeper into the graph.
///
/// The publish pipeline guarantees this, so a violation is a data-integrity
/// fault rather than a client error.
pub fn validate_transition(from_step: i32, to_step: i32) -> Result<(), CoreError> {
    if to_step <= from_step {
        return Err(CoreError::Internal(format!(
            "Story graph edge goes from step {from_step} to step {to_step}; \
             steps must strictly increase"
        )));
    }
    if to_step > MAX_STEP_NO {
        return Err(CoreError::Internal(format!(
            "Story graph edge targets step {to_step}, beyond maximum {MAX_STEP_NO}"
        )));
    }
    Ok(())
}

/// Check that a run may be finished.
///
/// Reaching the last node never completes a run on its own; the reader must
/// be on a node with no outgoing choices and must have rated it.
pub fn validate_finish(
    run_id: DbId,
    is_completed: bool,
    is_superseded: bool,
    outgoing_choices: usize,
    rating_submitted: bool,
) -> Result<(), CoreError> {
    ensure_open(run_id, is_completed, is_superseded)?;
    if outgoing_choices > 0 {
        return Err(CoreError::Validation(
            "Run can only be finished on a final chapter".to_string(),
        ));
    }
    if !rating_submitted {
        return Err(CoreError::Validation(
            "The final chapter must be rated before finishing".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
