//! # Session Aggregate
//!
//! The state machine and mutation operations over one rental session:
//! `open → closed` (normal checkout) or `open → void` (administrative).
//! There is no transition out of `closed`/`void`.
//!
//! A session captures two immutable snapshots at check-in - the resolved
//! hourly rate and the billing rule in force - so later changes to station
//! rates or global settings never affect an already-open session's
//! computation. Line items are an owned, ordered sequence embedded in the
//! aggregate and mutated only through its methods, which all enforce the
//! open-only invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::billing::{self, BillingRule, MinuteBreakdown};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::rates::RateSnapshot;
use crate::types::{Product, Station};
use crate::validation;
use crate::{MAX_ITEM_QUANTITY, MAX_SESSION_ITEMS};

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Accruing time and items.
    Open,
    /// Settled into a bill; terminal.
    Closed,
    /// Administratively cancelled, no bill; terminal.
    Void,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
            SessionStatus::Void => "void",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Line items
// =============================================================================

/// A service item accrued during the session.
///
/// Name and price are snapshots taken when the item was added; catalog
/// changes after that do not reprice the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    pub id: String,
    pub product_id: Option<String>,
    pub name_snapshot: String,
    pub price_snapshot: Money,
    pub qty: i64,
    #[serde(default)]
    pub note: String,
}

impl SessionItem {
    /// Line amount: price snapshot × quantity.
    pub fn amount(&self) -> Money {
        self.price_snapshot * self.qty
    }
}

// =============================================================================
// Preview
// =============================================================================

/// A caller-supplied discount reference for preview math only.
///
/// Unvalidated by design: preview quotes whatever the caller proposes, the
/// real promotion engine decides what applies at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewDiscount {
    pub kind: crate::promotion::DiscountKind,
    pub value: f64,
    pub max_amount: Option<Money>,
}

/// The non-mutating quote produced by [`Session::preview_close`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosePreview {
    pub raw_minutes: i64,
    pub bill_minutes: i64,
    pub play_amount: Money,
    pub service_amount: Money,
    pub subtotal: Money,
    pub discount_total: Money,
    pub surcharge: Money,
    pub total: Money,
    pub items: Vec<SessionItem>,
}

// =============================================================================
// Session
// =============================================================================

/// One open-to-closed occupancy interval of a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub station_id: String,
    /// Station type frozen at check-in, for promotion eligibility.
    pub station_type_id: Option<String>,
    pub branch_id: Option<String>,

    /// Hourly rate resolved at check-in; immutable thereafter.
    pub pricing: RateSnapshot,
    /// Rounding rule in force at check-in; immutable thereafter.
    pub billing_rule: BillingRule,

    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Billed minutes fixed at checkout; `None` while open.
    pub duration_minutes: Option<i64>,

    pub items: Vec<SessionItem>,

    pub staff_start: Option<String>,
    pub staff_end: Option<String>,

    #[serde(default)]
    pub note: String,

    pub status: SessionStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Opens a new session on a station, capturing the pricing and billing
    /// rule snapshots.
    ///
    /// Fails with `Inactive` when the station is administratively disabled.
    /// The one-open-session-per-station invariant is enforced by the data
    /// layer's uniqueness constraint, not here.
    pub fn open(
        station: &Station,
        pricing: RateSnapshot,
        billing_rule: BillingRule,
        start_time: DateTime<Utc>,
        staff_start: Option<String>,
    ) -> CoreResult<Session> {
        if !station.active {
            return Err(CoreError::Inactive {
                entity: "Station",
                id: station.id.clone(),
            });
        }

        Ok(Session {
            id: Uuid::new_v4().to_string(),
            station_id: station.id.clone(),
            station_type_id: Some(station.station_type_id.clone()),
            branch_id: station.branch_id.clone(),
            pricing,
            billing_rule,
            start_time,
            end_time: None,
            duration_minutes: None,
            items: Vec::new(),
            staff_start,
            staff_end: None,
            note: String::new(),
            status: SessionStatus::Open,
            created_at: start_time,
            updated_at: start_time,
        })
    }

    /// Whether the session can still be mutated.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::SessionNotOpen {
                id: self.id.clone(),
                status: self.status,
            })
        }
    }

    // -------------------------------------------------------------------------
    // Item mutations (open sessions only)
    // -------------------------------------------------------------------------

    /// Adds a product to the session, snapshotting its name and price.
    ///
    /// An identical product accumulates quantity on its existing line (and
    /// optionally overwrites the note); otherwise a new line is appended.
    pub fn add_item(&mut self, product: &Product, qty: i64, note: Option<&str>) -> CoreResult<()> {
        validation::validate_quantity(qty)?;
        self.ensure_open()?;
        if !product.active {
            return Err(CoreError::Inactive {
                entity: "Product",
                id: product.id.clone(),
            });
        }

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|it| it.product_id.as_deref() == Some(product.id.as_str()))
        {
            let new_qty = existing.qty + qty;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::Validation(
                    crate::error::ValidationError::OutOfRange {
                        field: "qty",
                        min: 1,
                        max: MAX_ITEM_QUANTITY,
                    },
                ));
            }
            existing.qty = new_qty;
            if let Some(n) = note {
                if !n.is_empty() {
                    existing.note = n.to_string();
                }
            }
            return Ok(());
        }

        if self.items.len() >= MAX_SESSION_ITEMS {
            return Err(CoreError::TooManyItems {
                max: MAX_SESSION_ITEMS,
            });
        }

        self.items.push(SessionItem {
            id: Uuid::new_v4().to_string(),
            product_id: Some(product.id.clone()),
            name_snapshot: product.name.clone(),
            price_snapshot: product.price(),
            qty,
            note: note.unwrap_or("").to_string(),
        });
        Ok(())
    }

    /// Sets a line's quantity; `qty <= 0` deletes the line.
    pub fn update_item_qty(&mut self, item_id: &str, qty: i64) -> CoreResult<()> {
        self.ensure_open()?;
        let idx = self
            .items
            .iter()
            .position(|it| it.id == item_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "Item",
                id: item_id.to_string(),
            })?;

        if qty <= 0 {
            self.items.remove(idx);
            return Ok(());
        }
        if qty > MAX_ITEM_QUANTITY {
            return Err(CoreError::Validation(
                crate::error::ValidationError::OutOfRange {
                    field: "qty",
                    min: 1,
                    max: MAX_ITEM_QUANTITY,
                },
            ));
        }
        self.items[idx].qty = qty;
        Ok(())
    }

    /// Removes a line entirely.
    pub fn remove_item(&mut self, item_id: &str) -> CoreResult<()> {
        self.ensure_open()?;
        let idx = self
            .items
            .iter()
            .position(|it| it.id == item_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "Item",
                id: item_id.to_string(),
            })?;
        self.items.remove(idx);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Derived amounts (computed at read time, never stored on the aggregate)
    // -------------------------------------------------------------------------

    /// Current service total: sum of line amounts.
    pub fn service_amount(&self) -> Money {
        self.items.iter().map(SessionItem::amount).sum()
    }

    /// Raw and billable minutes as of `now` (or the fixed end time, once set).
    pub fn compute_minutes(&self, now: DateTime<Utc>) -> MinuteBreakdown {
        let end = self.end_time.unwrap_or(now);
        billing::compute_minutes(self.start_time, end, &self.billing_rule)
    }

    /// Billable minutes and play charge as of `now`, from the snapshots.
    pub fn play_amount(&self, now: DateTime<Utc>) -> (MinuteBreakdown, Money) {
        let mb = self.compute_minutes(now);
        let amount = billing::compute_play_amount(self.pricing.rate_per_hour, mb.bill_minutes);
        (mb, amount)
    }

    /// Read-only quote of the bill as of `end_at`. Persists nothing.
    ///
    /// Caller-supplied discount lines get a simple percent/value reduction
    /// against the subtotal, each capped by its `max_amount`; the total is
    /// `subtotal - discounts + surcharge`, floored at zero. Real promotion
    /// eligibility runs in the promotion engine, not here.
    pub fn preview_close(
        &self,
        end_at: DateTime<Utc>,
        discounts: &[PreviewDiscount],
        surcharge: Money,
    ) -> ClosePreview {
        let mb = billing::compute_minutes(self.start_time, end_at, &self.billing_rule);
        let play_amount = billing::compute_play_amount(self.pricing.rate_per_hour, mb.bill_minutes);
        let service_amount = self.service_amount();
        let subtotal = play_amount + service_amount;

        let mut discount_total = 0.0_f64;
        for d in discounts {
            match d.kind {
                crate::promotion::DiscountKind::Percent => {
                    let cut = subtotal.units() as f64 * d.value / 100.0;
                    let cap = d
                        .max_amount
                        .map_or(subtotal.units() as f64, |m| m.units() as f64);
                    discount_total += cut.min(cap);
                }
                crate::promotion::DiscountKind::Value => discount_total += d.value,
            }
        }

        let total =
            Money::rounded_from(subtotal.units() as f64 - discount_total + surcharge.units() as f64);

        ClosePreview {
            raw_minutes: mb.raw_minutes,
            bill_minutes: mb.bill_minutes,
            play_amount,
            service_amount,
            subtotal,
            discount_total: Money::rounded_from(discount_total),
            surcharge,
            total,
            items: self.items.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Terminal transitions
    // -------------------------------------------------------------------------

    /// Transitions to `closed`, fixing the end time and billed duration.
    ///
    /// `staff_end` defaults to the opening staff member when unspecified.
    pub fn close(
        &mut self,
        end_at: DateTime<Utc>,
        bill_minutes: i64,
        staff_end: Option<String>,
    ) -> CoreResult<()> {
        self.ensure_open()?;
        self.end_time = Some(end_at);
        self.duration_minutes = Some(bill_minutes);
        self.staff_end = staff_end.or_else(|| self.staff_start.clone());
        self.status = SessionStatus::Closed;
        self.updated_at = end_at;
        Ok(())
    }

    /// Transitions to `void` (administrative cancel); no bill is produced.
    pub fn void(&mut self, at: DateTime<Utc>, staff: Option<String>) -> CoreResult<()> {
        self.ensure_open()?;
        self.end_time = Some(at);
        self.staff_end = staff.or_else(|| self.staff_start.clone());
        self.status = SessionStatus::Void;
        self.updated_at = at;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion::DiscountKind;
    use crate::rates::RateSource;
    use crate::types::StationStatus;
    use chrono::TimeZone;

    fn station() -> Station {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        Station {
            id: "st-1".into(),
            branch_id: None,
            name: "Table 1".into(),
            station_type_id: "tt-1".into(),
            rate_per_hour: Some(60_000),
            status: StationStatus::Available,
            order_index: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn product(id: &str, price: i64) -> Product {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        Product {
            id: id.into(),
            branch_id: None,
            name: format!("product {id}"),
            category_id: None,
            price_units: price,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn open_session() -> Session {
        let pricing = RateSnapshot {
            rate_per_hour: Money::from_units(60_000),
            rate_source: RateSource::Station,
        };
        let rule = BillingRule {
            rounding_step: 15,
            rounding_mode: crate::billing::RoundingMode::Ceil,
            grace_minutes: 0,
        };
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        Session::open(&station(), pricing, rule, start, Some("staff-1".into())).unwrap()
    }

    #[test]
    fn test_open_rejects_inactive_station() {
        let mut st = station();
        st.active = false;
        let pricing = RateSnapshot {
            rate_per_hour: Money::from_units(60_000),
            rate_source: RateSource::Station,
        };
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let err = Session::open(&st, pricing, BillingRule::default(), start, None).unwrap_err();
        assert!(matches!(err, CoreError::Inactive { entity: "Station", .. }));
    }

    #[test]
    fn test_add_item_merges_identical_product() {
        let mut s = open_session();
        let p = product("p-1", 25_000);
        s.add_item(&p, 1, None).unwrap();
        s.add_item(&p, 1, Some("no ice")).unwrap();

        assert_eq!(s.items.len(), 1);
        assert_eq!(s.items[0].qty, 2);
        assert_eq!(s.items[0].note, "no ice");
        assert_eq!(s.service_amount().units(), 50_000);
    }

    #[test]
    fn test_add_item_price_is_a_snapshot() {
        let mut s = open_session();
        let mut p = product("p-1", 25_000);
        s.add_item(&p, 1, None).unwrap();

        // catalog price changes after the fact
        p.price_units = 99_000;
        assert_eq!(s.items[0].price_snapshot.units(), 25_000);
        assert_eq!(s.service_amount().units(), 25_000);
    }

    #[test]
    fn test_add_item_guards() {
        let mut s = open_session();
        let p = product("p-1", 25_000);

        assert!(matches!(
            s.add_item(&p, 0, None).unwrap_err(),
            CoreError::Validation(_)
        ));

        let mut inactive = product("p-2", 1_000);
        inactive.active = false;
        assert!(matches!(
            s.add_item(&inactive, 1, None).unwrap_err(),
            CoreError::Inactive { entity: "Product", .. }
        ));

        s.close(s.start_time + chrono::Duration::minutes(30), 30, None)
            .unwrap();
        assert!(matches!(
            s.add_item(&p, 1, None).unwrap_err(),
            CoreError::SessionNotOpen { .. }
        ));
    }

    #[test]
    fn test_update_qty_and_removal() {
        let mut s = open_session();
        s.add_item(&product("p-1", 25_000), 2, None).unwrap();
        let item_id = s.items[0].id.clone();

        s.update_item_qty(&item_id, 5).unwrap();
        assert_eq!(s.items[0].qty, 5);

        // qty <= 0 deletes the line
        s.update_item_qty(&item_id, 0).unwrap();
        assert!(s.items.is_empty());

        assert!(matches!(
            s.update_item_qty(&item_id, 1).unwrap_err(),
            CoreError::NotFound { entity: "Item", .. }
        ));
        assert!(matches!(
            s.remove_item(&item_id).unwrap_err(),
            CoreError::NotFound { entity: "Item", .. }
        ));
    }

    #[test]
    fn test_update_qty_same_value_keeps_subtotal() {
        let mut s = open_session();
        s.add_item(&product("p-1", 25_000), 2, None).unwrap();
        let before = s.service_amount();

        let item_id = s.items[0].id.clone();
        s.update_item_qty(&item_id, 2).unwrap();
        assert_eq!(s.service_amount(), before);
    }

    #[test]
    fn test_preview_scenario() {
        // rate 60,000/hr, step 15 ceil, grace 0; 10:00 -> 10:47, qty 2 @ 25,000
        let mut s = open_session();
        s.add_item(&product("p-1", 25_000), 2, None).unwrap();

        let end = Utc.with_ymd_and_hms(2026, 3, 2, 10, 47, 0).unwrap();
        let preview = s.preview_close(end, &[], Money::zero());

        assert_eq!(preview.raw_minutes, 47);
        assert_eq!(preview.bill_minutes, 60);
        assert_eq!(preview.play_amount.units(), 60_000);
        assert_eq!(preview.service_amount.units(), 50_000);
        assert_eq!(preview.subtotal.units(), 110_000);
        assert_eq!(preview.total.units(), 110_000);

        // preview never mutates
        assert!(s.is_open());
        assert!(s.end_time.is_none());
    }

    #[test]
    fn test_preview_with_discounts_and_surcharge() {
        let mut s = open_session();
        s.add_item(&product("p-1", 25_000), 2, None).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 10, 47, 0).unwrap();

        let discounts = vec![PreviewDiscount {
            kind: DiscountKind::Percent,
            value: 10.0,
            max_amount: Some(Money::from_units(20_000)),
        }];
        let preview = s.preview_close(end, &discounts, Money::from_units(2_000));
        assert_eq!(preview.discount_total.units(), 11_000);
        assert_eq!(preview.total.units(), 101_000);

        // oversized value discount floors the total at zero
        let discounts = vec![PreviewDiscount {
            kind: DiscountKind::Value,
            value: 500_000.0,
            max_amount: None,
        }];
        let preview = s.preview_close(end, &discounts, Money::zero());
        assert_eq!(preview.total.units(), 0);
    }

    #[test]
    fn test_close_defaults_staff_end() {
        let mut s = open_session();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 10, 47, 0).unwrap();
        s.close(end, 60, None).unwrap();

        assert_eq!(s.status, SessionStatus::Closed);
        assert_eq!(s.duration_minutes, Some(60));
        assert_eq!(s.staff_end.as_deref(), Some("staff-1"));

        // terminal: closing again fails
        assert!(matches!(
            s.close(end, 60, None).unwrap_err(),
            CoreError::SessionNotOpen { .. }
        ));
    }

    #[test]
    fn test_void_is_terminal() {
        let mut s = open_session();
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 10, 0).unwrap();
        s.void(at, Some("manager-1".into())).unwrap();
        assert_eq!(s.status, SessionStatus::Void);
        assert!(s.void(at, None).is_err());
        assert!(s.close(at, 0, None).is_err());
    }
}
