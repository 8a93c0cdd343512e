//! Well-known role and plan names carried in access-token claims.

use crate::error::CoreError;

/// Administrators may adjust balances, issue refunds, and trigger credits.
pub const ROLE_ADMIN: &str = "admin";

/// Regular readers.
pub const ROLE_READER: &str = "reader";

/// The only plan subject to chapter pricing.
pub const PLAN_FREE: &str = "free";

/// Paid subscription; every chapter is open.
pub const PLAN_PREMIUM: &str = "premium";

/// Longest accepted username.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Validate the fields of a newly provisioned reader.
pub fn validate_new_user(username: &str, plan: Option<&str>) -> Result<(), CoreError> {
    if username.trim().is_empty() {
        return Err(CoreError::Validation("Username must not be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    match plan {
        None | Some(PLAN_FREE) | Some(PLAN_PREMIUM) => Ok(()),
        Some(other) => Err(CoreError::Validation(format!("Unknown plan: '{other}'"))),
    }
}
