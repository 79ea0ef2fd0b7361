//! # Domain Types
//!
//! Catalog and settlement types used throughout Baize POS.
//!
//! ## Type Map
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Station ──── StationType        Product                         │
//! │  status       base rate          name/price/category             │
//! │  rate override + day-rate        (snapshotted into sessions)     │
//! │                 schedule                                         │
//! │                                                                  │
//! │  Bill: the immutable settlement record produced at checkout.     │
//! │  One synthetic play line + one line per service item, totals     │
//! │  computed once by `Bill::settle`, frozen thereafter (payment     │
//! │  status fields excepted).                                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authentication, report read-models and catalog CRUD are external
//! collaborators; only the fields the billing engine reads live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;
use crate::promotion::DiscountLine;
use crate::rates::DayRate;

// =============================================================================
// Station
// =============================================================================

/// Operational status of a station.
///
/// Only `available ↔ occupied` transitions are driven by this engine
/// (check-in and checkout); the other states are administrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StationStatus {
    Available,
    Occupied,
    Reserved,
    OutOfService,
}

/// A rentable physical unit (e.g. a table) billed by elapsed time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Branch this station belongs to; `None` for single-branch setups.
    pub branch_id: Option<String>,

    /// Display name shown to staff and on bills.
    pub name: String,

    /// Rate-schedule profile for this station.
    pub station_type_id: String,

    /// Direct hourly-rate override. A non-negative value always wins over
    /// the type schedule; `None` inherits from the type.
    pub rate_per_hour: Option<i64>,

    /// Current operational status.
    pub status: StationStatus,

    /// Display ordering in the station grid.
    pub order_index: i64,

    /// Whether the station is usable (soft disable).
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Station {
    /// Checks if the station can accept a check-in right now.
    pub fn is_available(&self) -> bool {
        self.active && self.status == StationStatus::Available
    }
}

// =============================================================================
// Station Type
// =============================================================================

/// A rate-schedule profile shared by stations of the same kind.
///
/// `day_rates` order is significant: the first entry whose weekday set and
/// time window both match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationType {
    pub id: String,
    pub name: String,

    /// Fallback hourly rate when no schedule entry matches.
    pub base_rate_per_hour: i64,

    /// Ordered day/time-banded rates.
    pub day_rates: Vec<DayRate>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A service product that can be added to a session (drinks, snacks, gear).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub branch_id: Option<String>,
    pub name: String,

    /// Category reference, used by product-scope promotions.
    pub category_id: Option<String>,

    /// Price in currency units at catalog level; sessions snapshot it.
    pub price_units: i64,

    /// Whether product can currently be sold (soft delete).
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_units(self.price_units)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Bill
// =============================================================================

/// One itemized charge line on a bill.
///
/// The play line is synthetic (minutes × hourly rate); product lines carry
/// the name/price snapshots taken when the item was added to the session,
/// never live catalog lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BillItem {
    Play {
        minutes: i64,
        rate_per_hour: Money,
        amount: Money,
    },
    Product {
        product_id: Option<String>,
        name: String,
        unit_price: Money,
        qty: i64,
        amount: Money,
        #[serde(default)]
        note: String,
    },
}

impl BillItem {
    /// The charge amount of this line.
    pub fn amount(&self) -> Money {
        match self {
            BillItem::Play { amount, .. } => *amount,
            BillItem::Product { amount, .. } => *amount,
        }
    }
}

/// The inputs `Bill::settle` turns into a finalized bill.
#[derive(Debug, Clone)]
pub struct BillParts {
    pub session_id: String,
    pub station_id: String,
    /// Station display name frozen at checkout for report stability.
    pub station_name: String,
    pub branch_id: Option<String>,
    pub play_minutes: i64,
    pub play_rate_per_hour: Money,
    pub play_amount: Money,
    /// Product lines only; the synthetic play line is added by `settle`.
    pub service_items: Vec<BillItem>,
    pub discount_lines: Vec<DiscountLine>,
    pub surcharge: Money,
    pub payment_method: PaymentMethod,
    pub paid: bool,
    pub staff_id: Option<String>,
    /// Staff display name, resolved by the caller's user directory.
    pub staff_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The immutable settlement record produced at checkout.
///
/// Totals are computed exactly once, in [`Bill::settle`]; afterwards only
/// the payment-status fields (`paid`, `paid_at`, `payment_method`) may
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub session_id: String,
    pub station_id: String,
    pub station_name: String,
    pub branch_id: Option<String>,

    /// Play line first, then one line per service item.
    pub items: Vec<BillItem>,

    pub play_minutes: i64,
    pub play_amount: Money,
    pub service_amount: Money,
    pub subtotal: Money,

    pub discount_lines: Vec<DiscountLine>,
    pub discount_total: Money,
    pub surcharge: Money,
    pub total: Money,

    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: PaymentMethod,

    pub staff_id: Option<String>,
    pub staff_name: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Builds a finalized bill from its parts.
    ///
    /// - `service_amount` = sum of service line amounts
    /// - `subtotal` = play + service
    /// - `discount_total` = sum of discount line amounts (each clamped >= 0)
    /// - `surcharge` is clamped >= 0
    /// - `total` = subtotal - discounts + surcharge, floored at zero
    pub fn settle(parts: BillParts) -> Bill {
        let play_line = BillItem::Play {
            minutes: parts.play_minutes,
            rate_per_hour: parts.play_rate_per_hour,
            amount: parts.play_amount,
        };

        let service_amount: Money = parts
            .service_items
            .iter()
            .map(|it| it.amount().clamp_non_negative())
            .sum();
        let subtotal = parts.play_amount + service_amount;

        let discount_total: Money = parts
            .discount_lines
            .iter()
            .map(|d| d.amount.clamp_non_negative())
            .sum();
        let surcharge = parts.surcharge.clamp_non_negative();
        let total = (subtotal + surcharge).sub_clamped(discount_total);

        let mut items = Vec::with_capacity(parts.service_items.len() + 1);
        items.push(play_line);
        items.extend(parts.service_items);

        Bill {
            id: Uuid::new_v4().to_string(),
            session_id: parts.session_id,
            station_id: parts.station_id,
            station_name: parts.station_name,
            branch_id: parts.branch_id,
            items,
            play_minutes: parts.play_minutes,
            play_amount: parts.play_amount,
            service_amount,
            subtotal,
            discount_lines: parts.discount_lines,
            discount_total,
            surcharge,
            total,
            paid: parts.paid,
            paid_at: parts.paid.then_some(parts.created_at),
            payment_method: parts.payment_method,
            staff_id: parts.staff_id,
            staff_name: parts.staff_name,
            created_at: parts.created_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
