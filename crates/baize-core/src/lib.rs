//! # baize-core: Pure Business Logic for Baize POS
//!
//! This crate is the **heart** of the timed-rental billing engine. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Baize POS Data Flow                         │
//! │                                                                  │
//! │  API layer (excluded) ──► baize-service (orchestration)          │
//! │                                │                                 │
//! │  ┌─────────────────────────────▼────────────────────────────┐    │
//! │  │              ★ baize-core (THIS CRATE) ★                 │    │
//! │  │                                                          │    │
//! │  │   money     time      rates       billing                │    │
//! │  │   Money     TimeOfDay resolve_rate compute_minutes       │    │
//! │  │                                                          │    │
//! │  │   session            promotion          types            │    │
//! │  │   Session aggregate  apply_promotions   Station, Bill    │    │
//! │  │                                                          │    │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS       │    │
//! │  └─────────────────────────────┬────────────────────────────┘    │
//! │                                │                                 │
//! │                       baize-db (SQLite, sqlx)                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (no floating point)
//! - [`time`] - Wall-clock keys: time-of-day, overnight ranges, weekday index
//! - [`rates`] - Hourly-rate resolution (station override vs. type schedule)
//! - [`billing`] - Minute rounding rules and play-amount computation
//! - [`session`] - The Session aggregate (open/closed/void state machine)
//! - [`promotion`] - Discount rule eligibility, ordering, and stacking
//! - [`types`] - Catalog and settlement types (Station, Product, Bill)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation helpers
//!
//! ## Design Principles
//!
//! 1. **Pure functions**: same input = same output; "now" is a parameter
//! 2. **Integer money**: amounts are whole minor currency units (i64)
//! 3. **Immutable snapshots**: a session carries its rate and rounding rule
//!    from check-in; later catalog or settings changes never reprice it
//! 4. **Explicit errors**: typed enums, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod error;
pub mod money;
pub mod promotion;
pub mod rates;
pub mod session;
pub mod time;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use billing::{compute_minutes, compute_play_amount, BillingRule, MinuteBreakdown, RoundingMode};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use promotion::{
    apply_promotions, ApplyTarget, DiscountKind, DiscountLine, PromoScope, PromotionContext,
    PromotionOutcome, PromotionRule, ServiceLine,
};
pub use rates::{resolve_rate, DayRate, RateSnapshot, RateSource};
pub use session::{ClosePreview, PreviewDiscount, Session, SessionItem, SessionStatus};
pub use time::{weekday_index, TimeOfDay, TimeRange};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct line items allowed in a single session.
///
/// Prevents runaway sessions; can be made configurable per branch later.
pub const MAX_SESSION_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Prevents accidental over-ordering (e.g. typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
