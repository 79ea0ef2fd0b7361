//! # Service Error Types
//!
//! The orchestration layer surfaces domain failures ([`baize_core::CoreError`]:
//! not-found, invalid-state, conflict, validation, inactive) and persistence
//! failures ([`baize_db::DbError`]) unchanged; the API layer maps them to
//! user-facing responses. The one translation done here is at check-in,
//! where the uniqueness-constraint violation becomes a domain conflict.

use thiserror::Error;

use baize_core::CoreError;
use baize_db::DbError;

/// Errors surfaced by the orchestration layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business-rule failure (not-found, invalid state, conflict,
    /// validation, inactive).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// A persistence failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    /// Shorthand for a domain not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::Domain(CoreError::NotFound {
            entity,
            id: id.into(),
        })
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
