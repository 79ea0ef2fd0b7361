//! # Time Rules
//!
//! Pure wall-clock helpers: converting an instant to a day-of-week / time-of-
//! day key, and testing membership in intraday windows, including overnight
//! ("wrap-around") ranges like 22:00 → 03:00.
//!
//! Weekday indices are 0 = Sunday .. 6 = Saturday, matching the stored data
//! in rate schedules and promotion rules.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// =============================================================================
// TimeOfDay
// =============================================================================

/// A time of day as minutes since midnight (0..1440).
///
/// Serializes as an `"HH:MM"` string, the format used in rate schedules and
/// promotion time ranges.
///
/// ## Example
/// ```rust
/// use baize_core::time::TimeOfDay;
///
/// let t: TimeOfDay = "22:30".parse().unwrap();
/// assert_eq!(t.minutes(), 22 * 60 + 30);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Creates a time of day from hour and minute components.
    pub fn from_hm(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidFormat {
                field: "time",
                reason: format!("{hour:02}:{minute:02} is out of range"),
            });
        }
        Ok(TimeOfDay(hour as u16 * 60 + minute as u16))
    }

    /// Extracts the time-of-day key from an instant.
    pub fn of(at: DateTime<Utc>) -> Self {
        TimeOfDay((at.hour() * 60 + at.minute()) as u16)
    }

    /// Minutes since midnight.
    #[inline]
    pub const fn minutes(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    /// Parses an `"HH:MM"` string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "time",
            reason: format!("{s:?}: {reason}"),
        };

        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected HH:MM"))?;
        let hour: u8 = h.parse().map_err(|_| invalid("hour is not a number"))?;
        let minute: u8 = m.parse().map_err(|_| invalid("minute is not a number"))?;
        TimeOfDay::from_hm(hour, minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// =============================================================================
// TimeRange
// =============================================================================

/// An intraday window `[from, to]`, inclusive on both ends.
///
/// When `from > to` the window wraps past midnight and spans two calendar
/// days: membership is `t >= from OR t <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: TimeOfDay,
    pub to: TimeOfDay,
}

impl TimeRange {
    pub const fn new(from: TimeOfDay, to: TimeOfDay) -> Self {
        TimeRange { from, to }
    }

    /// Tests whether a time of day falls inside this window.
    pub fn contains(&self, t: TimeOfDay) -> bool {
        if self.from <= self.to {
            self.from <= t && t <= self.to
        } else {
            // overnight wrap
            t >= self.from || t <= self.to
        }
    }
}

// =============================================================================
// Weekday key
// =============================================================================

/// Weekday index of an instant: 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(at: DateTime<Utc>) -> u8 {
    at.weekday().num_days_from_sunday() as u8
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(tod("09:05").to_string(), "09:05");
        assert_eq!(tod("00:00").minutes(), 0);
        assert_eq!(tod("23:59").minutes(), 1439);

        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("9".parse::<TimeOfDay>().is_err());
        assert!("ab:cd".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let r = TimeRange::new(tod("22:00"), tod("03:00"));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"from":"22:00","to":"03:00"}"#);
        let back: TimeRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_plain_range() {
        let r = TimeRange::new(tod("08:00"), tod("17:00"));
        assert!(r.contains(tod("08:00")));
        assert!(r.contains(tod("12:00")));
        assert!(r.contains(tod("17:00")));
        assert!(!r.contains(tod("17:01")));
        assert!(!r.contains(tod("07:59")));
    }

    #[test]
    fn test_overnight_range() {
        // 22:00 -> 03:00 spans midnight
        let r = TimeRange::new(tod("22:00"), tod("03:00"));
        assert!(r.contains(tod("23:30")));
        assert!(r.contains(tod("02:00")));
        assert!(r.contains(tod("22:00")));
        assert!(r.contains(tod("03:00")));
        assert!(!r.contains(tod("12:00")));
        assert!(!r.contains(tod("03:01")));
    }

    #[test]
    fn test_weekday_index() {
        // 2026-03-01 is a Sunday
        let sunday = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(weekday_index(sunday), 0);
        let wednesday = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        assert_eq!(weekday_index(wednesday), 3);
    }
}
