//! # Error Types
//!
//! Domain-specific error types for baize-core.
//!
//! ## Error Kinds
//! Every failure the engine can surface falls into one of five kinds:
//! not-found, invalid-state (operation against a non-open session),
//! conflict (second open session on one station), validation failure, and
//! inactive (administratively disabled station/product). The persistence
//! layer has its own `DbError`; the orchestration layer wraps both.
//!
//! Promotion ineligibility is NOT an error: an ineligible rule is a normal
//! skip during evaluation.

use thiserror::Error;

use crate::session::SessionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations or domain state failures. They
/// are surfaced synchronously to the caller; the core never retries.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity cannot be found (station, session, product, or line item).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation attempted against a session that is not open.
    ///
    /// Covers both item mutations on a settled session and a checkout
    /// against an already-closed session.
    #[error("Session {id} is {status}, expected open")]
    SessionNotOpen { id: String, status: SessionStatus },

    /// A station already has an open session.
    ///
    /// Raised either by the pre-flight state check or by the data-layer
    /// uniqueness constraint on `(station, open)` - the constraint is the
    /// authoritative source under concurrent check-ins.
    #[error("Station {id} already has an open session")]
    OpenSessionExists { id: String },

    /// Station or product is administratively disabled.
    #[error("{entity} {id} is inactive")]
    Inactive { entity: &'static str, id: String },

    /// Session has reached the maximum number of distinct line items.
    #[error("Session cannot have more than {max} line items")]
    TooManyItems { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before business logic runs, when an input value cannot possibly
/// be correct (non-positive quantity, negative rate, malformed time range).
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: &'static str },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: &'static str, min: i64, max: i64 },

    /// Invalid format (e.g. a malformed "HH:MM" time-of-day).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: &'static str, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::OpenSessionExists {
            id: "st-7".to_string(),
        };
        assert_eq!(err.to_string(), "Station st-7 already has an open session");

        let err = CoreError::SessionNotOpen {
            id: "se-1".to_string(),
            status: SessionStatus::Closed,
        };
        assert_eq!(err.to_string(), "Session se-1 is closed, expected open");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive { field: "qty" };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
