//! Relative calendar dates used by phenology records and crop worksteps.
//!
//! The year component is a relative year (`0000` is the sowing year, `0001`
//! the following one) and is only carried through for formatting. All
//! day-of-year arithmetic happens in the non-leap reference year 2001.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{SimError, SimResult};

/// Non-leap year all day-of-year math is anchored to.
pub const REFERENCE_YEAR: i32 = 2001;

/// A `YYYY-MM-DD` date whose year is kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativeDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl RelativeDate {
    /// Create a date, validating month and day against the reference year.
    pub fn new(year: i32, month: u32, day: u32) -> SimResult<Self> {
        let date = Self { year, month, day };
        date.reference_date()?;
        Ok(date)
    }

    /// Parse `Y-M-D`. Components may omit zero padding.
    pub fn parse(s: &str) -> SimResult<Self> {
        let invalid = || SimError::InvalidDate(s.to_string());
        let mut parts = s.trim().splitn(3, '-');
        let year = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(invalid)?;
        let month = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let day = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        Self::new(year, month, day)
    }

    /// Day of year of month/day in 2001 (1..=365).
    pub fn day_of_year(&self) -> SimResult<u32> {
        Ok(self.reference_date()?.ordinal())
    }

    /// `2000-12-31 + days`, re-expressed with the given year.
    ///
    /// Offsets past day 365 wrap into the following calendar year, whose
    /// month and day are kept as-is.
    pub fn from_reference_offset(year: i32, days: i64) -> SimResult<Self> {
        let anchor = NaiveDate::from_ymd_opt(REFERENCE_YEAR - 1, 12, 31)
            .ok_or_else(|| SimError::InvalidDate("reference anchor".to_string()))?;
        let date = anchor
            .checked_add_signed(Duration::days(days))
            .ok_or_else(|| SimError::InvalidDate(format!("offset {} days", days)))?;
        Ok(Self {
            year,
            month: date.month(),
            day: date.day(),
        })
    }

    /// Same month and day with a different year.
    pub fn with_year(&self, year: i32) -> Self {
        Self { year, ..*self }
    }

    fn reference_date(&self) -> SimResult<NaiveDate> {
        NaiveDate::from_ymd_opt(REFERENCE_YEAR, self.month, self.day)
            .ok_or_else(|| SimError::InvalidDate(self.to_string()))
    }
}

impl fmt::Display for RelativeDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for RelativeDate {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RelativeDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RelativeDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let d = RelativeDate::parse("0001-7-5").unwrap();
        assert_eq!(d, RelativeDate { year: 1, month: 7, day: 5 });
        assert_eq!(d.to_string(), "0001-07-05");
    }

    #[test]
    fn test_day_of_year_ignores_year() {
        assert_eq!(RelativeDate::parse("2001-04-10").unwrap().day_of_year().unwrap(), 100);
        assert_eq!(RelativeDate::parse("0000-04-10").unwrap().day_of_year().unwrap(), 100);
        assert_eq!(RelativeDate::parse("0000-12-31").unwrap().day_of_year().unwrap(), 365);
    }

    #[test]
    fn test_leap_day_rejected() {
        assert!(matches!(
            RelativeDate::parse("2000-02-29"),
            Err(SimError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(RelativeDate::parse("").is_err());
        assert!(RelativeDate::parse("2001-13-01").is_err());
        assert!(RelativeDate::parse("tomorrow").is_err());
    }

    #[test]
    fn test_reference_offset() {
        let d = RelativeDate::from_reference_offset(2001, 99).unwrap();
        assert_eq!(d.to_string(), "2001-04-09");
        let d = RelativeDate::from_reference_offset(0, 1).unwrap();
        assert_eq!(d.to_string(), "0000-01-01");
        // Day 366 rolls into January
        let d = RelativeDate::from_reference_offset(0, 366).unwrap();
        assert_eq!(d.to_string(), "0000-01-01");
    }

    #[test]
    fn test_serde_as_string() {
        let d: RelativeDate = serde_json::from_str("\"0000-09-20\"").unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"0000-09-20\"");
    }
}
