use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{ClinicError, Result};

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A validated Monday..Sunday reporting week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl WeekRange {
    /// Fails unless `start` is a Monday and `end` is exactly six days later.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let span = (end - start).num_days();
        if start.weekday() != Weekday::Mon || span != 6 {
            tracing::error!(%start, %end, span, "rejecting week that is not Monday-Sunday");
            return Err(ClinicError::WeekSpan { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.range().contains(date)
    }
}

/// Monday of the week containing `reference`, with 0 = Sunday:
/// Sunday steps back six days, any other day steps back `dow - 1`.
pub fn week_start(reference: NaiveDate) -> NaiveDate {
    let dow = reference.weekday().num_days_from_sunday() as u64;
    let back = if dow == 0 { 6 } else { dow - 1 };
    reference - Days::new(back)
}

pub fn week_bounds(reference: NaiveDate) -> Result<WeekRange> {
    let start = week_start(reference);
    WeekRange::new(start, start + Days::new(6))
}

/// Parse `YYYY-MM-DD` as given on the command line.
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ClinicError::InvalidDate(raw.to_string()))
}

/// First and last day of a calendar month.
pub fn month_range(year: i32, month: u32) -> Result<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ClinicError::InvalidDate(format!("{year:04}-{month:02}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let end = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| ClinicError::InvalidDate(format!("{year:04}-{month:02}")))?;
    Ok(DateRange { start, end })
}

/// Parse `YYYY-MM`.
pub fn parse_month(raw: &str) -> Result<DateRange> {
    let parts: Vec<&str> = raw.trim().split('-').collect();
    if parts.len() != 2 {
        return Err(ClinicError::InvalidDate(raw.to_string()));
    }
    let year: i32 = parts[0]
        .parse()
        .map_err(|_| ClinicError::InvalidDate(raw.to_string()))?;
    let month: u32 = parts[1]
        .parse()
        .map_err(|_| ClinicError::InvalidDate(raw.to_string()))?;
    month_range(year, month)
}
