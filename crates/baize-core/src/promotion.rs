//! # Promotion Engine
//!
//! Selects, orders, and applies eligible discount rules against a billing
//! context, producing discount lines and the remaining discountable pools.
//!
//! ## Evaluation model
//! Rules arrive pre-filtered by branch and pre-ordered by
//! `(apply_order, created_at)` ascending - that ordering is load-bearing,
//! because it is also the application order. Three running pools (play,
//! service, bill) start at the context amounts; each applied discount is
//! deducted from the pool its target maps to, never below zero, so stacked
//! rules can exhaust a pool but not overdraw it.
//!
//! An ineligible rule is a normal skip, never an error. A rule with
//! `stackable = false` that actually applies is a hard cutoff: evaluation
//! stops immediately after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::time::{weekday_index, TimeOfDay, TimeRange};

// =============================================================================
// Rule model
// =============================================================================

/// Eligibility category of a discount rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PromoScope {
    /// Gated on station type and minimum play minutes.
    Time,
    /// Gated on matching service items (with optional combo requirement).
    Product,
    /// Gated on whole-bill thresholds.
    Bill,
}

/// How the discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `value` is a percentage of the eligible base (clamped to 0..100).
    Percent,
    /// `value` is a flat amount in currency units.
    Value,
}

impl Default for DiscountKind {
    fn default() -> Self {
        DiscountKind::Value
    }
}

/// Which running pool a discount is deducted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyTarget {
    Play,
    Service,
    Bill,
}

impl Default for ApplyTarget {
    fn default() -> Self {
        ApplyTarget::Bill
    }
}

/// The discount specification of a promotion rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountSpec {
    pub kind: DiscountKind,
    /// Percent (0..100) for `Percent`, flat currency units for `Value`.
    pub value: f64,
    /// Hard cap on the computed discount amount.
    pub max_amount: Option<Money>,
    pub applies_to: ApplyTarget,
}

impl Default for DiscountSpec {
    fn default() -> Self {
        DiscountSpec {
            kind: DiscountKind::Value,
            value: 0.0,
            max_amount: None,
            applies_to: ApplyTarget::Bill,
        }
    }
}

/// Calendar/time window plus time-scope gates.
///
/// `valid_to` is inclusive through the end of its calendar day. Empty
/// weekday/time-range/station-type lists mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeRule {
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    /// Weekday indices, 0 = Sunday .. 6 = Saturday.
    pub days_of_week: Vec<u8>,
    /// Intraday windows, overnight-aware.
    pub time_ranges: Vec<TimeRange>,
    /// Station-type allow-list for `time` scope.
    pub station_types: Vec<String>,
    /// Minimum billed play minutes for `time` scope.
    pub min_minutes: i64,
}

/// One required product in a combo gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboItem {
    pub product_id: String,
    pub qty: i64,
}

/// Product/category matching for `product` scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRule {
    /// Product allow-list; empty = any product.
    pub products: Vec<String>,
    /// Category allow-list; empty = any category.
    pub categories: Vec<String>,
    /// If non-empty, every listed product must appear among the eligible
    /// items with at least the required quantity, or the rule yields zero.
    pub combo: Vec<ComboItem>,
}

/// Whole-bill thresholds for `bill` scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillRule {
    pub station_types: Vec<String>,
    pub min_subtotal: Money,
    pub min_service_amount: Money,
    pub min_play_minutes: i64,
}

/// A promotional discount rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRule {
    pub id: String,
    pub branch_id: Option<String>,
    pub code: Option<String>,
    pub name: String,
    pub active: bool,

    /// Application order among eligible rules (ascending).
    pub apply_order: i64,
    /// `false` halts evaluation after this rule applies.
    pub stackable: bool,

    pub scope: PromoScope,
    pub discount: DiscountSpec,
    #[serde(default)]
    pub time_rule: TimeRule,
    #[serde(default)]
    pub product_rule: ProductRule,
    #[serde(default)]
    pub bill_rule: BillRule,

    pub created_at: DateTime<Utc>,
}

impl PromotionRule {
    /// Tests the rule's calendar/time window at `at`.
    ///
    /// Date range is inclusive, with end-of-day semantics for `valid_to`;
    /// weekday and intraday filters apply only when non-empty.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        let tr = &self.time_rule;

        if let Some(from) = tr.valid_from {
            if at < from {
                return false;
            }
        }
        if let Some(to) = tr.valid_to {
            if at.date_naive() > to.date_naive() {
                return false;
            }
        }

        if !tr.days_of_week.is_empty() && !tr.days_of_week.contains(&weekday_index(at)) {
            return false;
        }

        if !tr.time_ranges.is_empty() {
            let now = TimeOfDay::of(at);
            if !tr.time_ranges.iter().any(|r| r.contains(now)) {
                return false;
            }
        }

        true
    }
}

// =============================================================================
// Billing context
// =============================================================================

/// A normalized service line for product-scope matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub product_id: Option<String>,
    pub category_id: Option<String>,
    pub qty: i64,
    pub amount: Money,
}

/// Everything the engine needs to evaluate rules against one bill.
#[derive(Debug, Clone)]
pub struct PromotionContext {
    pub at: DateTime<Utc>,
    pub station_type_id: Option<String>,
    pub play_minutes: i64,
    pub play_amount: Money,
    pub service_items: Vec<ServiceLine>,
    pub service_amount: Money,
    pub subtotal: Money,
}

// =============================================================================
// Output
// =============================================================================

/// One applied discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountLine {
    pub name: String,
    pub kind: DiscountKind,
    pub value: f64,
    pub amount: Money,
    pub applies_to: ApplyTarget,
    pub promo_id: Option<String>,
    pub promo_code: Option<String>,
    pub scope: Option<PromoScope>,
}

/// Result of applying a rule list to a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub lines: Vec<DiscountLine>,
    pub discount_total: Money,
    pub play_remaining: Money,
    pub service_remaining: Money,
    pub bill_remaining: Money,
}

// =============================================================================
// Engine
// =============================================================================

/// Computes the discount amount for a spec against an eligible base.
///
/// Percent values are clamped into 0..100 and rounded half-up at the unit;
/// flat values are rounded to the unit. Both are capped by `max_amount`
/// (itself clamped >= 0) and clamped into `[0, base]`.
fn discount_amount(spec: &DiscountSpec, base: Money) -> Money {
    let amount = match spec.kind {
        DiscountKind::Percent => {
            let pct = spec.value.clamp(0.0, 100.0);
            let bps = (pct * 100.0).round() as u32;
            base.percent_bps(bps)
        }
        DiscountKind::Value => Money::rounded_from(spec.value),
    };

    let amount = match spec.max_amount {
        Some(cap) => amount.min(cap.clamp_non_negative()),
        None => amount,
    };

    Money::from_units(amount.units().clamp(0, base.units().max(0)))
}

/// Sums the amounts of service items matching the product rule.
///
/// Empty allow-lists match everything; an item without a product/category id
/// fails a non-empty corresponding list. An unsatisfied combo requirement
/// zeroes the whole rule.
fn eligible_product_amount(items: &[ServiceLine], rule: &ProductRule) -> Money {
    let eligible: Vec<&ServiceLine> = items
        .iter()
        .filter(|it| {
            let product_ok = rule.products.is_empty()
                || it
                    .product_id
                    .as_ref()
                    .map_or(false, |p| rule.products.contains(p));
            let category_ok = rule.categories.is_empty()
                || it
                    .category_id
                    .as_ref()
                    .map_or(false, |c| rule.categories.contains(c));
            product_ok && category_ok
        })
        .collect();

    if !rule.combo.is_empty() {
        let satisfied = rule.combo.iter().all(|required| {
            eligible
                .iter()
                .find(|it| it.product_id.as_deref() == Some(required.product_id.as_str()))
                .map_or(false, |it| it.qty >= required.qty.max(1))
        });
        if !satisfied {
            return Money::zero();
        }
    }

    eligible.iter().map(|it| it.amount.clamp_non_negative()).sum()
}

fn station_type_allowed(allow: &[String], station_type_id: Option<&String>) -> bool {
    allow.is_empty() || station_type_id.map_or(false, |t| allow.contains(t))
}

/// Applies an ordered rule list to a billing context.
///
/// The caller supplies rules already branch-filtered and ordered by
/// `(apply_order, created_at)` ascending; this function evaluates them in
/// that exact order.
pub fn apply_promotions(ctx: &PromotionContext, rules: &[PromotionRule]) -> PromotionOutcome {
    let mut play_remaining = ctx.play_amount.clamp_non_negative();
    let mut service_remaining = ctx.service_amount.clamp_non_negative();
    let mut bill_remaining = ctx.subtotal.clamp_non_negative();

    let mut lines: Vec<DiscountLine> = Vec::new();

    for rule in rules {
        if !rule.is_active_at(ctx.at) {
            continue;
        }

        let target = rule.discount.applies_to;
        let pool = match target {
            ApplyTarget::Play => play_remaining,
            ApplyTarget::Service => service_remaining,
            ApplyTarget::Bill => bill_remaining,
        };
        if !pool.is_positive() {
            continue; // nothing left to discount on this target
        }

        let eligible_base = match rule.scope {
            PromoScope::Time => {
                let tr = &rule.time_rule;
                let type_ok =
                    station_type_allowed(&tr.station_types, ctx.station_type_id.as_ref());
                if !type_ok || ctx.play_minutes < tr.min_minutes {
                    Money::zero()
                } else {
                    pool
                }
            }
            PromoScope::Product => {
                // product scope never discounts the play pool
                if target == ApplyTarget::Play {
                    Money::zero()
                } else {
                    eligible_product_amount(&ctx.service_items, &rule.product_rule).min(pool)
                }
            }
            PromoScope::Bill => {
                let br = &rule.bill_rule;
                let type_ok =
                    station_type_allowed(&br.station_types, ctx.station_type_id.as_ref());
                if !type_ok
                    || ctx.subtotal < br.min_subtotal
                    || ctx.service_amount < br.min_service_amount
                    || ctx.play_minutes < br.min_play_minutes
                {
                    Money::zero()
                } else {
                    pool
                }
            }
        };

        if !eligible_base.is_positive() {
            continue;
        }

        let cut = discount_amount(&rule.discount, eligible_base);
        if !cut.is_positive() {
            continue;
        }

        match target {
            ApplyTarget::Play => play_remaining = play_remaining.sub_clamped(cut),
            ApplyTarget::Service => service_remaining = service_remaining.sub_clamped(cut),
            ApplyTarget::Bill => bill_remaining = bill_remaining.sub_clamped(cut),
        }

        lines.push(DiscountLine {
            name: rule.name.clone(),
            kind: rule.discount.kind,
            value: rule.discount.value,
            amount: cut,
            applies_to: target,
            promo_id: Some(rule.id.clone()),
            promo_code: rule.code.clone(),
            scope: Some(rule.scope),
        });

        if !rule.stackable {
            break; // hard cutoff
        }
    }

    let discount_total = lines.iter().map(|l| l.amount.clamp_non_negative()).sum();

    PromotionOutcome {
        lines,
        discount_total,
        play_remaining,
        service_remaining,
        bill_remaining,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
