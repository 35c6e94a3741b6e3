//! Native date, time and timestamp structs.
//!
//! Layouts in a bound buffer (native endian):
//! - DATE: year i16, month u16, day u16 (6 bytes)
//! - TIME: hour u16, minute u16, second u16 (6 bytes)
//! - TIMESTAMP: DATE + TIME + fraction u32 in nanoseconds (16 bytes)

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;

/// Calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date {
    pub year: i16,
    pub month: u16,
    pub day: u16,
}

/// Time of day without fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time {
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

/// Date and time with a nanosecond fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub year: i16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub fraction: u32,
}

impl Date {
    pub fn new(year: i16, month: u16, day: u16) -> Self {
        Self { year, month, day }
    }

    /// Convert to a chrono date, validating ranges.
    pub fn to_naive(&self) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32).ok_or_else(
            || {
                Error::type_incompatible(format!(
                    "invalid DATE: year={}, month={}, day={}",
                    self.year, self.month, self.day
                ))
            },
        )
    }
}

impl Time {
    pub fn new(hour: u16, minute: u16, second: u16) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    /// Convert to a chrono time, validating ranges.
    pub fn to_naive(&self) -> Result<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
            .ok_or_else(|| {
                Error::type_incompatible(format!(
                    "invalid TIME: hour={}, minute={}, second={}",
                    self.hour, self.minute, self.second
                ))
            })
    }
}

impl Timestamp {
    pub fn date(&self) -> Date {
        Date::new(self.year, self.month, self.day)
    }

    pub fn time(&self) -> Time {
        Time::new(self.hour, self.minute, self.second)
    }

    /// Convert to a chrono date-time, validating ranges.
    pub fn to_naive(&self) -> Result<NaiveDateTime> {
        let date = self.date().to_naive()?;
        let time = NaiveTime::from_hms_nano_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
            self.fraction,
        )
        .ok_or_else(|| {
            Error::type_incompatible(format!(
                "invalid TIMESTAMP time part: {}:{}:{}.{}",
                self.hour, self.minute, self.second, self.fraction
            ))
        })?;
        Ok(NaiveDateTime::new(date, time))
    }
}

impl From<Date> for Timestamp {
    fn from(d: Date) -> Self {
        Self {
            year: d.year,
            month: d.month,
            day: d.day,
            ..Default::default()
        }
    }
}

fn native_year(year: i32) -> Result<i16> {
    i16::try_from(year)
        .map_err(|_| Error::type_incompatible(format!("year {} is outside the native date range", year)))
}

impl TryFrom<NaiveDate> for Date {
    type Error = Error;

    fn try_from(d: NaiveDate) -> Result<Self> {
        Ok(Self {
            year: native_year(d.year())?,
            month: d.month() as u16,
            day: d.day() as u16,
        })
    }
}

impl From<NaiveTime> for Time {
    fn from(t: NaiveTime) -> Self {
        Self {
            hour: t.hour() as u16,
            minute: t.minute() as u16,
            second: t.second() as u16,
        }
    }
}

impl TryFrom<NaiveDateTime> for Timestamp {
    type Error = Error;

    fn try_from(dt: NaiveDateTime) -> Result<Self> {
        Ok(Self {
            year: native_year(dt.year())?,
            month: dt.month() as u16,
            day: dt.day() as u16,
            hour: dt.hour() as u16,
            minute: dt.minute() as u16,
            second: dt.second() as u16,
            fraction: dt.nanosecond(),
        })
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date(), self.time())?;
        if self.fraction != 0 {
            write!(f, ".{:09}", self.fraction)?;
        }
        Ok(())
    }
}

/// Parse `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Result<Date> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::type_incompatible(format!("invalid DATE literal '{}': {}", s, e)))
        .and_then(Date::try_from)
}

/// Parse `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<Time> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
        .map(Time::from)
        .map_err(|e| Error::type_incompatible(format!("invalid TIME literal '{}': {}", s, e)))
}

/// Parse `YYYY-MM-DD HH:MM:SS[.fff]` or a bare date.
pub fn parse_timestamp(s: &str) -> Result<Timestamp> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| Error::type_incompatible(e.to_string()))
        .and_then(Timestamp::try_from)
        .or_else(|_| parse_date(s).map(Timestamp::from))
        .map_err(|_| Error::type_incompatible(format!("invalid TIMESTAMP literal '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_to_naive() {
        let d = Date::new(2024, 10, 21);
        assert_eq!(d.to_naive().unwrap(), NaiveDate::from_ymd_opt(2024, 10, 21).unwrap());
    }

    #[test]
    fn test_invalid_date() {
        assert!(Date::new(2024, 13, 1).to_naive().is_err());
        assert!(Date::new(2023, 2, 29).to_naive().is_err());
    }

    #[test]
    fn test_timestamp_from_chrono() {
        let dt = NaiveDate::from_ymd_opt(2024, 10, 21)
            .unwrap()
            .and_hms_nano_opt(12, 36, 5, 250_000_000)
            .unwrap();
        let ts = Timestamp::try_from(dt).unwrap();
        assert_eq!(ts.hour, 12);
        assert_eq!(ts.fraction, 250_000_000);
        assert_eq!(ts.to_naive().unwrap(), dt);
    }

    #[test]
    fn test_year_outside_native_range() {
        let far = NaiveDate::from_ymd_opt(40_000, 1, 1).unwrap();
        assert!(matches!(Date::try_from(far), Err(Error::TypeIncompatible { .. })));
        let before = NaiveDate::from_ymd_opt(-40_000, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(matches!(Timestamp::try_from(before), Err(Error::TypeIncompatible { .. })));
        let edge = NaiveDate::from_ymd_opt(32_767, 12, 31).unwrap();
        assert_eq!(Date::try_from(edge).unwrap().year, i16::MAX);
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_date("2020-02-29").unwrap(), Date::new(2020, 2, 29));
        assert_eq!(parse_time("23:59:01").unwrap(), Time::new(23, 59, 1));
        let ts = parse_timestamp("2021-01-02 03:04:05.5").unwrap();
        assert_eq!(ts.second, 5);
        assert_eq!(ts.fraction, 500_000_000);
        assert_eq!(parse_timestamp("2021-01-02").unwrap().hour, 0);
    }

    #[test]
    fn test_display() {
        let ts = Timestamp {
            year: 2024,
            month: 1,
            day: 9,
            hour: 8,
            minute: 7,
            second: 6,
            fraction: 0,
        };
        assert_eq!(ts.to_string(), "2024-01-09 08:07:06");
    }
}
