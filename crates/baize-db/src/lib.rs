//! # baize-db: Database Layer for Baize POS
//!
//! SQLite persistence for the billing engine, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  baize-service (check-in / items / checkout orchestration)       │
//! │       │                                                          │
//! │  ┌────▼─────────────────────────────────────────────────────┐    │
//! │  │                  baize-db (THIS CRATE)                   │    │
//! │  │                                                          │    │
//! │  │   Database        Repositories          Migrations       │    │
//! │  │   (pool.rs)       sessions, bills,      (embedded SQL)   │    │
//! │  │   SqlitePool      stations, products,                    │    │
//! │  │   WAL + FK on     promotions, settings                   │    │
//! │  └────┬─────────────────────────────────────────────────────┘    │
//! │       ▼                                                          │
//! │  SQLite database file (or :memory: for tests)                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction boundary
//! Repositories expose `*_conn` variants taking `&mut SqliteConnection` so
//! the orchestration layer can run check-in and checkout as single atomic
//! units. The partial unique index on `sessions(station_id) WHERE status =
//! 'open'` enforces at-most-one-open-session-per-station; its violation is
//! surfaced as [`DbError::UniqueViolation`] and mapped to a conflict by the
//! caller.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::bill::BillRepository;
pub use repository::product::ProductRepository;
pub use repository::promotion::PromotionRepository;
pub use repository::session::SessionRepository;
pub use repository::setting::SettingRepository;
pub use repository::station::{StationRepository, StationTypeRepository};
