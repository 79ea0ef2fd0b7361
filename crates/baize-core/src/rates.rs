//! # Rate Resolution
//!
//! Picks the hourly rate effective for a station at a given instant.
//!
//! Resolution order:
//! 1. the station's direct non-negative override (always wins)
//! 2. the first matching entry of the type's day-rate schedule
//! 3. the type's base rate
//!
//! Schedule order is significant; an entry with an empty weekday set matches
//! any day, and one without a time window matches any time. Windows may wrap
//! past midnight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::time::{weekday_index, TimeOfDay, TimeRange};
use crate::types::{Station, StationType};

// =============================================================================
// Schedule entries
// =============================================================================

/// One day/time-banded rate in a station type's schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayRate {
    /// Weekday indices (0 = Sunday .. 6 = Saturday); empty = any day.
    pub days: Vec<u8>,
    /// Intraday window, overnight-aware; `None` = any time.
    pub window: Option<TimeRange>,
    pub rate_per_hour: i64,
}

impl Default for DayRate {
    fn default() -> Self {
        DayRate {
            days: Vec::new(),
            window: None,
            rate_per_hour: 0,
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// The station's own override.
    Station,
    /// The station type's schedule or base rate.
    Type,
}

/// The pricing snapshot captured onto a session at check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub rate_per_hour: Money,
    pub rate_source: RateSource,
}

/// Resolves the hourly rate for `station` at `at`.
///
/// Pure and deterministic for a given instant.
pub fn resolve_rate(station: &Station, station_type: &StationType, at: DateTime<Utc>) -> RateSnapshot {
    if let Some(rate) = station.rate_per_hour {
        if rate >= 0 {
            return RateSnapshot {
                rate_per_hour: Money::from_units(rate),
                rate_source: RateSource::Station,
            };
        }
    }

    let day = weekday_index(at);
    let now = TimeOfDay::of(at);

    for entry in &station_type.day_rates {
        let day_ok = entry.days.is_empty() || entry.days.contains(&day);
        let time_ok = entry.window.map_or(true, |w| w.contains(now));
        if day_ok && time_ok {
            return RateSnapshot {
                rate_per_hour: Money::from_units(entry.rate_per_hour),
                rate_source: RateSource::Type,
            };
        }
    }

    RateSnapshot {
        rate_per_hour: Money::from_units(station_type.base_rate_per_hour),
        rate_source: RateSource::Type,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
