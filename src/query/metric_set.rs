use crate::query::buckets::{AovBucket, FicoBucket, FicoGroup, ZeroAprBucket};
use crate::query::window::ReportingWindow;
use crate::warehouse::Statement;
use serde::Serialize;
use std::fmt;

/// Table name used when none is configured.
pub const DEFAULT_TABLE: &str = "CHECKOUT_FUNNEL_V5";

/// The fixed aggregate queries the dashboard is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSet {
    /// Approved vs term-selected checkouts per FICO bucket.
    FicoDropoff,
    /// Confirmation with and without a selected term, per FICO bucket.
    TermConfirmation,
    /// Approved vs dropped-off checkouts per order-value bucket.
    AovDropoff,
    /// Approved vs dropped-off checkouts per (FICO group, order-value bucket).
    FicoAovMatrix,
    /// Completion of $1000+ approved orders by longest 0% APR offer.
    ZeroApr,
}

impl MetricSet {
    pub const ALL: [Self; 5] = [
        Self::FicoDropoff,
        Self::TermConfirmation,
        Self::AovDropoff,
        Self::FicoAovMatrix,
        Self::ZeroApr,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::FicoDropoff => "fico_dropoff",
            Self::TermConfirmation => "term_confirmation",
            Self::AovDropoff => "aov_dropoff",
            Self::FicoAovMatrix => "fico_aov_matrix",
            Self::ZeroApr => "zero_apr",
        }
    }

    /// Deterministic cache key for this metric set over a window.
    pub fn cache_key(self, window: &ReportingWindow) -> String {
        format!("{}:{}", self.name(), window.cache_fragment())
    }

    /// Render the aggregate statement for `window` against `table`.
    ///
    /// Dates and filter labels are bound parameters; only the validated table
    /// identifier and fixed bucket expressions are interpolated.
    pub fn statement(self, table: &FunnelTable, window: &ReportingWindow) -> Statement {
        let mut params = vec![
            window.start().to_string(),
            window.end_exclusive().to_string(),
        ];
        let mut predicates = vec![
            "CHECKOUT_CREATED_DT >= CAST(? AS DATE)".to_string(),
            "CHECKOUT_CREATED_DT < CAST(? AS DATE)".to_string(),
        ];
        if let Some(bucket) = window.filter.fico_bucket {
            predicates.push(format!("({}) = ?", FicoBucket::SQL_CASE));
            params.push(bucket.label().to_string());
        }
        if let Some(bucket) = window.filter.aov_bucket {
            predicates.push(format!("({}) = ?", AovBucket::SQL_CASE));
            params.push(bucket.label().to_string());
        }
        match self {
            Self::FicoAovMatrix => predicates.push("FICO_SCORE IS NOT NULL".to_string()),
            Self::ZeroApr => {
                predicates.push("TOTAL_AMOUNT >= 1000".to_string());
                predicates.push("IS_APPROVED = 1".to_string());
            }
            _ => {}
        }
        let filter = predicates.join("\n  AND ");
        let table = table.as_str();

        let sql = match self {
            Self::FicoDropoff => format!(
                "SELECT {fico} AS FICO_SCORE_BUCKET,
    CAST(COUNT(*) AS BIGINT) AS TOTAL_CHECKOUTS,
    CAST(SUM(CASE WHEN IS_APPROVED = 1 THEN 1 ELSE 0 END) AS BIGINT) AS APPROVED,
    CAST(SUM(CASE WHEN IS_APPROVED = 1 AND TERM_LENGTH IS NOT NULL THEN 1 ELSE 0 END) AS BIGINT) AS TERM_SELECTED
FROM {table}
WHERE {filter}
GROUP BY 1
ORDER BY 1",
                fico = FicoBucket::SQL_CASE,
            ),
            Self::TermConfirmation => format!(
                "SELECT {fico} AS FICO_SCORE_BUCKET,
    CAST(SUM(CASE WHEN TERM_LENGTH IS NOT NULL THEN 1 ELSE 0 END) AS BIGINT) AS WITH_TERM_SELECTED,
    CAST(SUM(CASE WHEN TERM_LENGTH IS NOT NULL AND IS_CONFIRMED = 1 THEN 1 ELSE 0 END) AS BIGINT) AS CONFIRMED_WITH_TERM,
    CAST(SUM(CASE WHEN TERM_LENGTH IS NULL THEN 1 ELSE 0 END) AS BIGINT) AS WITHOUT_TERM_SELECTED,
    CAST(SUM(CASE WHEN TERM_LENGTH IS NULL AND IS_CONFIRMED = 1 THEN 1 ELSE 0 END) AS BIGINT) AS CONFIRMED_WITHOUT_TERM
FROM {table}
WHERE {filter}
GROUP BY 1
ORDER BY 1",
                fico = FicoBucket::SQL_CASE,
            ),
            Self::AovDropoff => format!(
                "SELECT {aov} AS AOV_BUCKET,
    CAST(SUM(CASE WHEN IS_APPROVED = 1 THEN 1 ELSE 0 END) AS BIGINT) AS APPROVED,
    CAST(SUM(CASE WHEN IS_APPROVED = 1 AND TERM_LENGTH IS NULL THEN 1 ELSE 0 END) AS BIGINT) AS DROPPED_OFF
FROM {table}
WHERE {filter}
GROUP BY 1
ORDER BY 1",
                aov = AovBucket::SQL_CASE,
            ),
            Self::FicoAovMatrix => format!(
                "SELECT {group} AS FICO_GROUP,
    {aov} AS AOV_BUCKET,
    CAST(SUM(CASE WHEN IS_APPROVED = 1 THEN 1 ELSE 0 END) AS BIGINT) AS APPROVED,
    CAST(SUM(CASE WHEN IS_APPROVED = 1 AND TERM_LENGTH IS NULL THEN 1 ELSE 0 END) AS BIGINT) AS DROPPED_OFF
FROM {table}
WHERE {filter}
GROUP BY 1, 2
ORDER BY 1, 2",
                group = FicoGroup::SQL_CASE,
                aov = AovBucket::SQL_CASE_SHORT,
            ),
            Self::ZeroApr => {
                let longest = ZeroAprBucket::SQL_LONGEST_ZERO_APR_PLAN;
                format!(
                    "SELECT CASE
        WHEN {longest} = 0 THEN '{none}'
        WHEN {longest} <= 6 THEN '{up_to_6}'
        WHEN {longest} <= 12 THEN '{up_to_12}'
        ELSE '{over_12}'
    END AS ZERO_APR_BUCKET,
    CAST(COUNT(*) AS BIGINT) AS TOTAL_APPROVED,
    CAST(SUM(CASE WHEN TERM_LENGTH IS NOT NULL THEN 1 ELSE 0 END) AS BIGINT) AS COMPLETED,
    CAST(SUM(CASE WHEN TERM_LENGTH IS NULL THEN 1 ELSE 0 END) AS BIGINT) AS DROPPED_OFF
FROM {table}
WHERE {filter}
GROUP BY 1
ORDER BY 1",
                    none = ZeroAprBucket::None.label(),
                    up_to_6 = ZeroAprBucket::UpTo6.label(),
                    up_to_12 = ZeroAprBucket::UpTo12.label(),
                    over_12 = ZeroAprBucket::Over12.label(),
                )
            }
        };

        Statement::new(sql, params)
    }
}

impl fmt::Display for MetricSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated, fully qualified name of the funnel event table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelTable {
    database: Option<String>,
    schema: Option<String>,
    qualified: String,
}

impl FunnelTable {
    /// Join `[database.][schema.]table`, rejecting anything but ASCII
    /// alphanumerics and `_` in each part.
    pub fn new(database: Option<&str>, schema: Option<&str>, table: &str) -> Result<Self, String> {
        let database = database.filter(|p| !p.is_empty());
        let schema = schema.filter(|p| !p.is_empty());
        if table.is_empty() {
            return Err("table name must not be empty".to_string());
        }
        let parts: Vec<&str> = [database, schema, Some(table)].into_iter().flatten().collect();
        for part in &parts {
            if part.len() > 128 {
                return Err(format!("identifier '{part}' exceeds 128 characters"));
            }
            if !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(format!(
                    "identifier '{part}' may only contain alphanumeric characters and '_'"
                ));
            }
        }
        Ok(Self {
            database: database.map(str::to_string),
            schema: schema.map(str::to_string),
            qualified: parts.join("."),
        })
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// The schema the table lives in, qualified with its database if any.
    /// `None` when the table name carries no schema.
    pub fn qualified_schema(&self) -> Option<String> {
        let schema = self.schema.as_deref()?;
        Some(match self.database() {
            Some(db) => format!("{db}.{schema}"),
            None => schema.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.qualified
    }
}

impl fmt::Display for FunnelTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified)
    }
}
