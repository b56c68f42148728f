//! Calendar handling for daily SST data.
//!
//! The dataset publishes one file per year, daily fields, starting
//! September 1981, with a ~3 day publication lag behind the present.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::SstError;

/// First day of dataset coverage (September 1, 1981).
pub fn coverage_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1981, 9, 1).expect("static date")
}

/// Days of publication lag behind the present.
pub const PUBLICATION_LAG_DAYS: i64 = 3;

/// A calendar date validated against dataset coverage.
///
/// Construction rejects dates before September 1981 or closer to the
/// present than the publication lag, so nothing downstream ever fetches
/// a date the source cannot serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataDay(NaiveDate);

impl DataDay {
    /// Validate `date` against coverage, with `today` as the reference
    /// instant for the publication-lag bound.
    pub fn new(date: NaiveDate, today: NaiveDate) -> Result<Self, SstError> {
        let min = coverage_start();
        let max = latest_available(today);
        if date < min || date > max {
            return Err(SstError::DateOutOfRange { date, min, max });
        }
        Ok(Self(date))
    }

    /// Parse an ISO `YYYY-MM-DD` string and validate coverage.
    pub fn parse(s: &str, today: NaiveDate) -> Result<Self, SstError> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| SstError::InvalidDate(format!("{s}: expected YYYY-MM-DD")))?;
        Self::new(date, today)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Zero-based index of this day within its year's daily file.
    pub fn day_index(&self) -> usize {
        self.0.ordinal0() as usize
    }

    pub fn to_key(&self) -> DateKey {
        DateKey {
            month: self.0.month(),
            day: self.0.day(),
        }
    }
}

impl std::fmt::Display for DataDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Latest date the source can be expected to serve, given `today`.
pub fn latest_available(today: NaiveDate) -> NaiveDate {
    today - Duration::days(PUBLICATION_LAG_DAYS)
}

/// A (month, day) pair selecting a calendar day across years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateKey {
    pub month: u32,
    pub day: u32,
}

impl DateKey {
    pub fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    /// Apply the leap-day policy: February 29 maps to February 28.
    ///
    /// Returns the effective key and whether the policy fired, so callers
    /// can surface the user-visible notice.
    pub fn normalized(&self) -> (DateKey, bool) {
        if self.month == 2 && self.day == 29 {
            (DateKey { month: 2, day: 28 }, true)
        } else {
            (*self, false)
        }
    }

    /// The same calendar day in `year`, or `None` when it does not exist
    /// there (February 29 in a non-leap year).
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

impl std::fmt::Display for DateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// The fixed 30-year climatology baseline period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimatologyWindow {
    pub start_year: i32,
    pub end_year: i32,
}

/// WMO standard reference period used as the process-wide default.
pub const DEFAULT_CLIMATOLOGY_WINDOW: ClimatologyWindow = ClimatologyWindow {
    start_year: 1991,
    end_year: 2020,
};

impl Default for ClimatologyWindow {
    fn default() -> Self {
        DEFAULT_CLIMATOLOGY_WINDOW
    }
}

impl ClimatologyWindow {
    /// Iterate the window years in ascending order, inclusive.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }

    pub fn len(&self) -> usize {
        (self.end_year - self.start_year + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end_year < self.start_year
    }
}

impl std::fmt::Display for ClimatologyWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_coverage_accepts_valid_date() {
        let today = day(2023, 7, 20);
        let dd = DataDay::new(day(2023, 7, 15), today).unwrap();
        assert_eq!(dd.year(), 2023);
        assert_eq!(dd.to_key(), DateKey::new(7, 15));
    }

    #[test]
    fn test_coverage_rejects_before_start() {
        let today = day(2023, 7, 20);
        let err = DataDay::new(day(1970, 1, 1), today).unwrap_err();
        assert!(matches!(err, SstError::DateOutOfRange { .. }));
    }

    #[test]
    fn test_coverage_rejects_publication_lag() {
        let today = day(2023, 7, 20);
        // today - 3 is the last valid day
        assert!(DataDay::new(day(2023, 7, 17), today).is_ok());
        assert!(DataDay::new(day(2023, 7, 18), today).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let today = day(2023, 7, 20);
        assert!(matches!(
            DataDay::parse("not-a-date", today),
            Err(SstError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_day_index() {
        let today = day(2023, 7, 20);
        let jan1 = DataDay::new(day(2023, 1, 1), today).unwrap();
        assert_eq!(jan1.day_index(), 0);
        let feb1 = DataDay::new(day(2023, 2, 1), today).unwrap();
        assert_eq!(feb1.day_index(), 31);
    }

    #[test]
    fn test_leap_day_normalization() {
        let (key, notice) = DateKey::new(2, 29).normalized();
        assert_eq!(key, DateKey::new(2, 28));
        assert!(notice);

        let (key, notice) = DateKey::new(7, 15).normalized();
        assert_eq!(key, DateKey::new(7, 15));
        assert!(!notice);
    }

    #[test]
    fn test_key_in_year_skips_missing_days() {
        let key = DateKey::new(2, 29);
        assert!(key.in_year(2020).is_some()); // leap year
        assert!(key.in_year(2019).is_none()); // not a leap year
        assert_eq!(DateKey::new(2, 28).in_year(2019), Some(day(2019, 2, 28)));
    }

    #[test]
    fn test_climatology_window_default() {
        let w = ClimatologyWindow::default();
        assert_eq!(w.len(), 30);
        let years: Vec<i32> = w.years().collect();
        assert_eq!(years.first(), Some(&1991));
        assert_eq!(years.last(), Some(&2020));
    }
}
