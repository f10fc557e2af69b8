use std::fmt;

use chrono::{Days, NaiveDate};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("invalid date {0:?} (expected YYYY-MM-DD)")]
    Malformed(String),
    #[error("start date {start} is after end date {end}")]
    Reversed { start: NaiveDate, end: NaiveDate },
}

/// Date range, both ends inclusive. A single day has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse two ISO `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, DateRangeError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    #[inline] pub fn start(&self) -> NaiveDate { self.start }

    #[inline] pub fn end(&self) -> NaiveDate { self.end }

    pub fn start_iso(&self) -> String { self.start.format(DATE_FORMAT).to_string() }

    pub fn end_iso(&self) -> String { self.end.format(DATE_FORMAT).to_string() }

    /// Day after `end`: image collections filter with an exclusive upper bound.
    pub fn end_exclusive_iso(&self) -> String {
        self.end.checked_add_days(Days::new(1)).unwrap_or(self.end).format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start_iso(), self.end_iso())
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, DateRangeError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| DateRangeError::Malformed(s.to_string()))
}
