//! Billing period (calendar month) and period expansion.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid period '{0}', expected YYYY-MM")]
    Malformed(String),
    #[error("month {0} is out of range")]
    MonthOutOfRange(u32),
    #[error("year {0} is out of range, expected 1..=9999")]
    YearOutOfRange(i32),
}

/// A billing cycle identified by year and month. Serialised as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=9999).contains(&year) {
            return Err(PeriodError::YearOutOfRange(year));
        }
        if !(1..=12).contains(&month) {
            return Err(PeriodError::MonthOutOfRange(month));
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // month is validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn plus_months(&self, months: u32) -> Self {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 + i64::from(months);
        Self {
            year: i32::try_from(index.div_euclid(12)).unwrap_or(i32::MAX),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| PeriodError::Malformed(s.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| PeriodError::Malformed(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| PeriodError::Malformed(s.to_string()))?;
        Period::new(year, month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How often bills recur in a multi-period request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingFrequency {
    pub fn months(&self) -> u32 {
        match self {
            BillingFrequency::Monthly => 1,
            BillingFrequency::Quarterly => 3,
            BillingFrequency::Yearly => 12,
        }
    }
}

/// The set of periods a generation request covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodSpec {
    Explicit(Vec<Period>),
    Recurring {
        frequency: BillingFrequency,
        count: u32,
        start: Period,
    },
}

impl PeriodSpec {
    /// Expand into concrete periods. Duplicates are dropped, order is kept.
    pub fn periods(&self) -> Vec<Period> {
        let expanded: Vec<Period> = match self {
            PeriodSpec::Explicit(periods) => periods.clone(),
            PeriodSpec::Recurring {
                frequency,
                count,
                start,
            } => (0..*count)
                .map(|i| start.plus_months(i * frequency.months()))
                .collect(),
        };

        let mut seen = std::collections::HashSet::new();
        expanded.into_iter().filter(|p| seen.insert(*p)).collect()
    }
}
