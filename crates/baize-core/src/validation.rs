//! # Validation Module
//!
//! Early input checks shared by the aggregate methods and the orchestration
//! layer. Business-state rules (open-only mutation, uniqueness) live with
//! the Session aggregate and the data layer; this module only rejects
//! values that cannot possibly be correct.

use crate::error::ValidationError;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a quantity being added to a session.
///
/// Must be strictly positive and within the per-line maximum.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive { field: "qty" });
    }
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "qty",
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates an hourly rate override or schedule rate.
pub fn validate_rate_per_hour(rate: i64) -> ValidationResult<()> {
    if rate < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: "rate_per_hour",
        });
    }
    Ok(())
}

/// Validates a display name (station, product).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Required { field: "name" });
    }
    if name.len() > 200 {
        return Err(ValidationError::OutOfRange {
            field: "name",
            min: 1,
            max: 200,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_rate() {
        assert!(validate_rate_per_hour(0).is_ok());
        assert!(validate_rate_per_hour(60_000).is_ok());
        assert!(validate_rate_per_hour(-1).is_err());
    }

    #[test]
    fn test_name() {
        assert!(validate_name("Table 1").is_ok());
        assert!(validate_name("  ").is_err());
        assert!(validate_name(&"x".repeat(300)).is_err());
    }
}
