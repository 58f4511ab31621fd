//! Chart- and table-shaped projections of fetched metric tables.
//!
//! Every function here is pure: it takes a [`Table`](crate::query::table::Table)
//! and returns a serializable view. Views are recomputed on each request and
//! never cached. A rate whose denominator is zero is `None`, rendered as
//! "no data".

pub mod aov;
pub mod apr;
pub mod fico;
pub mod term;

use serde::Serialize;

/// Percentage `numerator / denominator * 100`, or `None` when the
/// denominator is zero.
#[allow(clippy::cast_precision_loss)]
pub fn rate(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    Some(numerator as f64 * 100.0 / denominator as f64)
}

/// Round a percentage to `places` decimals for display.
pub fn round_to(value: Option<f64>, places: i32) -> Option<f64> {
    let factor = 10f64.powi(places);
    value.map(|v| (v * factor).round() / factor)
}

/// One bar in a single-series chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: Option<f64>,
}
