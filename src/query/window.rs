use crate::query::buckets::{AovBucket, FicoBucket};
use chrono::{Days, NaiveDate};
use serde::Serialize;

/// Longest window a caller may request.
pub const MAX_WINDOW_DAYS: u64 = 366;

/// Optional dimension filters applied to every metric set in a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FunnelFilter {
    pub fico_bucket: Option<FicoBucket>,
    pub aov_bucket: Option<AovBucket>,
}

/// Inclusive date range plus filters. Purely a parameter object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReportingWindow {
    start: NaiveDate,
    end: NaiveDate,
    pub filter: FunnelFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("end_date must not be before start_date")]
    EndBeforeStart,
    #[error("window of {0} days exceeds the {MAX_WINDOW_DAYS}-day limit")]
    TooLong(u64),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid period '{0}'. Use '7d', '30d', '90d', or provide start_date and end_date")]
    InvalidPeriod(String),
}

impl ReportingWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if end < start {
            return Err(WindowError::EndBeforeStart);
        }
        let days = u64::try_from((end - start).num_days()).unwrap_or(u64::MAX) + 1;
        if days > MAX_WINDOW_DAYS {
            return Err(WindowError::TooLong(days));
        }
        Ok(Self {
            start,
            end,
            filter: FunnelFilter::default(),
        })
    }

    /// Parse explicit `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, WindowError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| WindowError::InvalidDate(s.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Every date from `days` days before `today` through `today`, both ends
    /// included: the rows a `created >= today - days` filter keeps.
    pub fn lookback(today: NaiveDate, days: u64) -> Result<Self, WindowError> {
        let start = today
            .checked_sub_days(Days::new(days))
            .ok_or_else(|| WindowError::InvalidPeriod(format!("{days}d")))?;
        Self::new(start, today)
    }

    /// Resolve a named period (`7d`, `30d`, `90d`) against `today`. `30d`
    /// reaches back to the same date last month, so it spans 31 dates.
    pub fn from_period(period: &str, today: NaiveDate) -> Result<Self, WindowError> {
        let days = match period {
            "7d" => 7,
            "30d" => 30,
            "90d" => 90,
            _ => return Err(WindowError::InvalidPeriod(period.to_string())),
        };
        Self::lookback(today, days)
    }

    #[must_use]
    pub const fn with_filter(mut self, filter: FunnelFilter) -> Self {
        self.filter = filter;
        self
    }

    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// First day after the window; SQL uses it as an exclusive upper bound.
    pub fn end_exclusive(&self) -> NaiveDate {
        self.end.succ_opt().unwrap_or(self.end)
    }

    /// Canonical text form used in cache keys.
    pub fn cache_fragment(&self) -> String {
        format!(
            "{}:{}:fico={}:aov={}",
            self.start,
            self.end,
            self.filter.fico_bucket.map_or("*", FicoBucket::slug),
            self.filter.aov_bucket.map_or("*", AovBucket::slug),
        )
    }
}
