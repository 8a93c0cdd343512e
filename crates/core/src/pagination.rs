//! Limit/offset bounds for listing endpoints.

/// Default page size for ledger listings.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Largest page a client may request.
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_bounds() {
        assert_eq!(clamp_limit(None, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 50);
        assert_eq!(clamp_limit(Some(0), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 1);
        assert_eq!(clamp_limit(Some(10_000), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 200);
        assert_eq!(clamp_limit(Some(25), DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT), 25);
    }

    #[test]
    fn offset_floors_at_zero() {
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some(-4)), 0);
        assert_eq!(clamp_offset(Some(30)), 30);
    }
}
