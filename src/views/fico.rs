use crate::query::buckets::FicoBucket;
use crate::query::table::Table;
use crate::views::{rate, round_to, ChartPoint};
use serde::Serialize;

/// Dropoff for one FICO bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FicoDropoffRow {
    pub fico_bucket: String,
    pub total_checkouts: u64,
    pub approved: u64,
    pub term_selected: u64,
    pub dropped_off: u64,
    pub dropoff_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FicoDropoffView {
    pub rows: Vec<FicoDropoffRow>,
    /// Dropoff by bucket, excluding applicants with no score.
    pub chart: Vec<ChartPoint>,
}

/// Headline totals across all FICO buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelSummary {
    pub total_approved: u64,
    pub term_selected: u64,
    pub dropped_off: u64,
    pub overall_dropoff_pct: Option<f64>,
}

fn bucket_rank(label: &str) -> usize {
    FicoBucket::from_label(label).map_or(FicoBucket::ALL.len(), FicoBucket::rank)
}

/// Derive the FICO dropoff table and chart from a `FicoDropoff` result.
pub fn fico_dropoff(table: &Table) -> FicoDropoffView {
    let mut rows: Vec<FicoDropoffRow> = table
        .records()
        .map(|r| {
            let approved = r.count("APPROVED");
            let term_selected = r.count("TERM_SELECTED");
            let dropped_off = approved.saturating_sub(term_selected);
            FicoDropoffRow {
                fico_bucket: r
                    .label("FICO_SCORE_BUCKET", FicoBucket::NoScore.label())
                    .to_string(),
                total_checkouts: r.count("TOTAL_CHECKOUTS"),
                approved,
                term_selected,
                dropped_off,
                dropoff_pct: round_to(rate(dropped_off, approved), 2),
            }
        })
        .collect();
    rows.sort_by_key(|row| bucket_rank(&row.fico_bucket));

    let chart = rows
        .iter()
        .filter(|row| row.fico_bucket != FicoBucket::NoScore.label())
        .map(|row| ChartPoint {
            label: row.fico_bucket.clone(),
            value: row.dropoff_pct,
        })
        .collect();

    FicoDropoffView { rows, chart }
}

/// Sum the FICO dropoff rows into headline totals.
pub fn summary(view: &FicoDropoffView) -> FunnelSummary {
    let total_approved: u64 = view.rows.iter().map(|r| r.approved).sum();
    let dropped_off: u64 = view.rows.iter().map(|r| r.dropped_off).sum();
    FunnelSummary {
        total_approved,
        term_selected: total_approved - dropped_off,
        dropped_off,
        overall_dropoff_pct: round_to(rate(dropped_off, total_approved), 1),
    }
}
