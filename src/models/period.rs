use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Calendar month a transaction falls in, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
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

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::from_date(date) == *self
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .with_context(|| format!("Invalid month '{s}' (expected YYYY-MM)"))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("Invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("Invalid month in '{s}'"))?;
        PeriodKey::new(year, month).with_context(|| format!("Month out of range in '{s}'"))
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_year_month() {
        let key: PeriodKey = "2025-07".parse().unwrap();
        assert_eq!(key.year(), 2025);
        assert_eq!(key.month(), 7);
        assert_eq!(key.to_string(), "2025-07");
    }

    #[test]
    fn rejects_bad_months() {
        assert!("2025-13".parse::<PeriodKey>().is_err());
        assert!("2025".parse::<PeriodKey>().is_err());
        assert!("July".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn orders_chronologically() {
        let dec: PeriodKey = "2024-12".parse().unwrap();
        let jan: PeriodKey = "2025-01".parse().unwrap();
        assert!(dec < jan);
    }

    #[test]
    fn contains_checks_month_membership() {
        let key = PeriodKey::new(2025, 3).unwrap();
        assert!(key.contains(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()));
        assert!(!key.contains(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()));
    }
}
