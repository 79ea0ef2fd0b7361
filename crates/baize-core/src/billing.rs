//! # Billing Rule Engine
//!
//! Converts elapsed wall-clock time into billable minutes under a
//! configurable rounding policy, and billable minutes + hourly rate into a
//! money amount.
//!
//! ## Two-stage rounding
//! Raw minutes are ALWAYS the per-minute ceiling of elapsed time; the
//! configured rounding mode then operates on those already-ceiled raw
//! minutes, not on true elapsed time. Downstream reporting depends on this
//! two-stage behavior, so `floor`/`round` modes never see sub-minute
//! precision.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::money::Money;

// =============================================================================
// Rounding policy
// =============================================================================

/// How billable minutes are rounded to the step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    /// Round up to the next step (default).
    Ceil,
    /// Round down to the previous step.
    Floor,
    /// Round half-up to the nearest step.
    Round,
}

impl Default for RoundingMode {
    fn default() -> Self {
        RoundingMode::Ceil
    }
}

/// The minute-rounding rule in force for a session.
///
/// Snapshotted onto the session at check-in; settings changes after that
/// never affect an open session's computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingRule {
    /// Rounding step in minutes (1/5/10/15...); `<= 1` disables rounding.
    pub rounding_step: i64,
    pub rounding_mode: RoundingMode,
    /// Sessions at or under this many raw minutes bill zero.
    pub grace_minutes: i64,
}

/// The hard-coded minimal default, used when neither a branch nor a global
/// setting exists: 5-minute step, ceiling, no grace.
impl Default for BillingRule {
    fn default() -> Self {
        BillingRule {
            rounding_step: 5,
            rounding_mode: RoundingMode::Ceil,
            grace_minutes: 0,
        }
    }
}

// =============================================================================
// Minutes & amount
// =============================================================================

/// Elapsed minutes before and after the rounding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteBreakdown {
    /// Per-minute ceiling of elapsed wall-clock time, floored at 0.
    pub raw_minutes: i64,
    /// Minutes actually billed after grace and step rounding.
    pub bill_minutes: i64,
}

/// Computes raw and billable minutes for the `[start, end]` interval.
///
/// - `raw = ceil(elapsed / 60s)`, never negative
/// - `raw <= grace` bills zero (the grace period is entirely free)
/// - step `<= 1` bills raw minutes unchanged
/// - otherwise raw is divided by the step, rounded per mode, and scaled back
pub fn compute_minutes(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rule: &BillingRule,
) -> MinuteBreakdown {
    let elapsed_ms = (end - start).num_milliseconds().max(0);
    let raw_minutes = (elapsed_ms + 59_999) / 60_000;

    if raw_minutes <= rule.grace_minutes.max(0) {
        return MinuteBreakdown {
            raw_minutes,
            bill_minutes: 0,
        };
    }

    let step = rule.rounding_step;
    if step <= 1 {
        return MinuteBreakdown {
            raw_minutes,
            bill_minutes: raw_minutes,
        };
    }

    let units = match rule.rounding_mode {
        RoundingMode::Floor => raw_minutes / step,
        RoundingMode::Round => (2 * raw_minutes + step) / (2 * step),
        RoundingMode::Ceil => (raw_minutes + step - 1) / step,
    };

    MinuteBreakdown {
        raw_minutes,
        bill_minutes: units * step,
    }
}

/// Converts billable minutes and an hourly rate into a money amount.
///
/// `amount = round(rate / 60 * minutes)`, half-up, clamped at zero. This is
/// the single point where the play charge is rounded to the currency unit.
pub fn compute_play_amount(rate_per_hour: Money, bill_minutes: i64) -> Money {
    let product = rate_per_hour.units() as i128 * bill_minutes.max(0) as i128;
    let amount = (product + 30) / 60;
    Money::from_units(amount as i64).clamp_non_negative()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rule(step: i64, mode: RoundingMode, grace: i64) -> BillingRule {
        BillingRule {
            rounding_step: step,
            rounding_mode: mode,
            grace_minutes: grace,
        }
    }

    fn span(minutes: i64, seconds: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        (start, start + chrono::Duration::seconds(minutes * 60 + seconds))
    }

    #[test]
    fn test_raw_minutes_is_per_minute_ceiling() {
        let (s, e) = span(46, 1); // 46m01s -> 47 raw
        let mb = compute_minutes(s, e, &rule(1, RoundingMode::Ceil, 0));
        assert_eq!(mb.raw_minutes, 47);
        assert_eq!(mb.bill_minutes, 47);

        let (s, e) = span(0, 0); // zero elapsed
        let mb = compute_minutes(s, e, &rule(1, RoundingMode::Ceil, 0));
        assert_eq!(mb.raw_minutes, 0);

        // end before start clamps to zero
        let mb = compute_minutes(e, s - chrono::Duration::minutes(5), &rule(1, RoundingMode::Ceil, 0));
        assert_eq!(mb.raw_minutes, 0);
    }

    #[test]
    fn test_grace_period_bills_zero() {
        for raw in 1..=10 {
            let (s, e) = span(raw, 0);
            let mb = compute_minutes(s, e, &rule(5, RoundingMode::Ceil, 10));
            assert_eq!(mb.bill_minutes, 0, "raw={raw} within grace must bill 0");
        }
        // one past grace bills normally
        let (s, e) = span(11, 0);
        let mb = compute_minutes(s, e, &rule(5, RoundingMode::Ceil, 10));
        assert_eq!(mb.bill_minutes, 15);
    }

    #[test]
    fn test_rounding_modes() {
        let (s, e) = span(47, 0);
        assert_eq!(
            compute_minutes(s, e, &rule(15, RoundingMode::Ceil, 0)).bill_minutes,
            60
        );
        assert_eq!(
            compute_minutes(s, e, &rule(15, RoundingMode::Floor, 0)).bill_minutes,
            45
        );
        // 47/15 = 3.13 -> 3 -> 45
        assert_eq!(
            compute_minutes(s, e, &rule(15, RoundingMode::Round, 0)).bill_minutes,
            45
        );
        // 53/15 = 3.53 -> 4 -> 60
        let (s, e) = span(53, 0);
        assert_eq!(
            compute_minutes(s, e, &rule(15, RoundingMode::Round, 0)).bill_minutes,
            60
        );
    }

    #[test]
    fn test_bill_minutes_always_multiple_of_step() {
        let modes = [RoundingMode::Ceil, RoundingMode::Floor, RoundingMode::Round];
        for step in [5, 10, 15, 30] {
            for mode in modes {
                for raw in 1..=180 {
                    let (s, e) = span(raw, 0);
                    let mb = compute_minutes(s, e, &rule(step, mode, 0));
                    assert_eq!(
                        mb.bill_minutes % step,
                        0,
                        "step={step} mode={mode:?} raw={raw}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_step_of_one_disables_rounding() {
        let (s, e) = span(47, 0);
        let mb = compute_minutes(s, e, &rule(1, RoundingMode::Floor, 0));
        assert_eq!(mb.bill_minutes, 47);
    }

    #[test]
    fn test_amount_rounds_at_the_unit() {
        // 60,000/hr for 60 minutes = 60,000
        assert_eq!(
            compute_play_amount(Money::from_units(60_000), 60).units(),
            60_000
        );
        // 10,000/hr for 7 minutes = 1,166.67 -> 1,167
        assert_eq!(
            compute_play_amount(Money::from_units(10_000), 7).units(),
            1_167
        );
        // zero and negative minutes clamp
        assert_eq!(compute_play_amount(Money::from_units(10_000), 0).units(), 0);
        assert_eq!(compute_play_amount(Money::from_units(10_000), -5).units(), 0);
    }

    #[test]
    fn test_amount_monotonic_in_minutes() {
        let rate = Money::from_units(45_500);
        let mut prev = Money::zero();
        for minutes in 0..=240 {
            let amount = compute_play_amount(rate, minutes);
            assert!(amount >= prev, "amount regressed at {minutes} minutes");
            prev = amount;
        }
    }

    #[test]
    fn test_default_rule() {
        let d = BillingRule::default();
        assert_eq!(d.rounding_step, 5);
        assert_eq!(d.rounding_mode, RoundingMode::Ceil);
        assert_eq!(d.grace_minutes, 0);
    }

    #[test]
    fn test_rule_deserializes_with_defaults() {
        let r: BillingRule = serde_json::from_str("{}").unwrap();
        assert_eq!(r, BillingRule::default());
        let r: BillingRule =
            serde_json::from_str(r#"{"rounding_step":15,"rounding_mode":"round"}"#).unwrap();
        assert_eq!(r.rounding_step, 15);
        assert_eq!(r.rounding_mode, RoundingMode::Round);
    }
}
