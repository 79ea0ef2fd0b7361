//! # baize-service: Session Lifecycle & Checkout Orchestration
//!
//! The orchestration layer of Baize POS. Computation lives in baize-core,
//! persistence in baize-db; this crate sequences them into the operations an
//! API layer consumes:
//!
//! - [`SessionService`] - check-in, item add/update/remove, preview close,
//!   administrative void
//! - [`CheckoutCoordinator`] - promotion quoting and the atomic checkout
//!   (close session + create bill + free station as one transaction), plus
//!   the bill payment-status update
//!
//! ## Atomicity
//! Check-in, void, and checkout each run inside a single database
//! transaction begun here; a failure at any step rolls everything back, so
//! a closed session without a bill (or vice versa) is unrepresentable.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod sessions;

#[cfg(test)]
mod testutil;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutCoordinator, CheckoutOutcome, CheckoutRequest, Quote};
pub use error::{ServiceError, ServiceResult};
pub use sessions::SessionService;
