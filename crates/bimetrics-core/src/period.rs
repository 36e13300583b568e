//! Period keys for ordering time-series report rows
//!
//! Rows are ordered by an explicit year-month key ("2024-03") rather than
//! by position in a list of month names, so January 2025 sorts after
//! December 2024.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Row;

/// `YYYY-MM` or `YYYY-MM-DD`, optionally followed by a time part
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})(?:-(\d{1,2})(?:[T ].*)?)?$").unwrap());

/// Calendar month used as an ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub year: i32,
    pub month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> CoreResult<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self::from_date)
            .ok_or_else(|| CoreError::InvalidPeriod {
                value: format!("{}-{}", year, month),
            })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse "2024-03", "2024-03-15" (with or without a time suffix) or "Mar 2024"
    pub fn parse(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        let invalid = || CoreError::InvalidPeriod {
            value: value.to_string(),
        };

        if let Some(caps) = ISO_DATE.captures(trimmed) {
            let year: i32 = caps[1].parse().map_err(|_| invalid())?;
            let month: u32 = caps[2].parse().map_err(|_| invalid())?;
            let day: u32 = match caps.get(3) {
                Some(day) => day.as_str().parse().map_err(|_| invalid())?,
                None => 1,
            };
            return NaiveDate::from_ymd_opt(year, month, day)
                .map(Self::from_date)
                .ok_or_else(invalid);
        }

        NaiveDate::parse_from_str(&format!("1 {}", trimmed), "%d %B %Y")
            .map(Self::from_date)
            .map_err(|_| invalid())
    }

    /// Display label such as "Mar 2024"
    pub fn label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(date) => date.format("%b %Y").to_string(),
            None => self.to_string(),
        }
    }

    /// The following month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for PeriodKey {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeriodKey::parse(s)
    }
}

/// Stable sort of rows by the period key in `field`.
///
/// Rows whose key is missing or unparseable keep their relative order and
/// follow all rows with a valid key.
pub fn order_by_period(rows: &[Row], field: &str) -> Vec<Row> {
    let mut keyed: Vec<(Option<PeriodKey>, &Row)> = rows
        .iter()
        .map(|row| {
            let key = row.get(field).and_then(|v| PeriodKey::parse(&v.label()).ok());
            (key, row)
        })
        .collect();

    let unparsed = keyed.iter().filter(|(k, _)| k.is_none()).count();
    if unparsed > 0 {
        log::warn!(
            target: "bimetrics::period",
            "{} rows have no valid period key in '{}'",
            unparsed,
            field
        );
    }

    keyed.sort_by_key(|(key, _)| (key.is_none(), *key));
    keyed.into_iter().map(|(_, row)| row.clone()).collect()
}
