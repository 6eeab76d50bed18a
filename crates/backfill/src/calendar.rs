//! Trading-date resolution.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// Resolves which dates in a range the market was open.
pub trait MarketCalendar: Send + Sync {
    /// Open dates in `[start, end]`, ascending. Empty when `start > end`.
    fn open_dates(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate>;
}

/// Monday to Friday, minus a list of holidays.
#[derive(Debug, Clone, Default)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    /// Calendar with no holidays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calendar closed on each of `holidays`.
    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Whether the market is open on `date`.
    pub fn is_open(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}

impl MarketCalendar for WeekdayCalendar {
    fn open_dates(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_open(*d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_skips_weekends() {
        let cal = WeekdayCalendar::new();
        // 2020-01-03 is a Friday.
        let dates = cal.open_dates(date("2020-01-03"), date("2020-01-07"));
        assert_eq!(dates, vec![date("2020-01-03"), date("2020-01-06"), date("2020-01-07")]);
    }

    #[test]
    fn test_skips_holidays() {
        let cal = WeekdayCalendar::with_holidays([date("2020-01-01")]);
        let dates = cal.open_dates(date("2019-12-31"), date("2020-01-02"));
        assert_eq!(dates, vec![date("2019-12-31"), date("2020-01-02")]);
        assert!(!cal.is_open(date("2020-01-01")));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let cal = WeekdayCalendar::new();
        assert!(cal.open_dates(date("2020-01-07"), date("2020-01-06")).is_empty());
    }

    #[test]
    fn test_single_day_range() {
        let cal = WeekdayCalendar::new();
        assert_eq!(cal.open_dates(date("2020-01-06"), date("2020-01-06")), vec![date("2020-01-06")]);
        assert!(cal.open_dates(date("2020-01-04"), date("2020-01-04")).is_empty());
    }
}
