use crate::query::buckets::FicoBucket;
use crate::query::table::Table;
use crate::views::{rate, round_to};
use serde::Serialize;

pub const WITH_TERM: &str = "With Term Selected";
pub const WITHOUT_TERM: &str = "Without Term Selected";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermConfirmationRow {
    pub fico_bucket: String,
    pub with_term_selected: u64,
    pub confirmed_with_term: u64,
    pub confirm_rate_with_term: Option<f64>,
    pub without_term_selected: u64,
    pub confirmed_without_term: u64,
    pub confirm_rate_without_term: Option<f64>,
}

/// Long-form point for a grouped bar chart: one per (bucket, series).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub fico_bucket: String,
    pub series: &'static str,
    pub confirmation_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermSelectionView {
    pub rows: Vec<TermConfirmationRow>,
    pub series: Vec<SeriesPoint>,
}

/// Derive confirm rates with and without a selected term from a
/// `TermConfirmation` result.
pub fn term_selection(table: &Table) -> TermSelectionView {
    let mut rows: Vec<TermConfirmationRow> = table
        .records()
        .map(|r| {
            let with_term = r.count("WITH_TERM_SELECTED");
            let confirmed_with = r.count("CONFIRMED_WITH_TERM");
            let without_term = r.count("WITHOUT_TERM_SELECTED");
            let confirmed_without = r.count("CONFIRMED_WITHOUT_TERM");
            TermConfirmationRow {
                fico_bucket: r
                    .label("FICO_SCORE_BUCKET", FicoBucket::NoScore.label())
                    .to_string(),
                with_term_selected: with_term,
                confirmed_with_term: confirmed_with,
                confirm_rate_with_term: round_to(rate(confirmed_with, with_term), 2),
                without_term_selected: without_term,
                confirmed_without_term: confirmed_without,
                confirm_rate_without_term: round_to(rate(confirmed_without, without_term), 2),
            }
        })
        .collect();
    rows.sort_by_key(|row| {
        FicoBucket::from_label(&row.fico_bucket).map_or(FicoBucket::ALL.len(), FicoBucket::rank)
    });

    // Melt the two rate columns into one series column.
    let series = rows
        .iter()
        .filter(|row| row.fico_bucket != FicoBucket::NoScore.label())
        .flat_map(|row| {
            [
                SeriesPoint {
                    fico_bucket: row.fico_bucket.clone(),
                    series: WITH_TERM,
                    confirmation_rate: row.confirm_rate_with_term,
                },
                SeriesPoint {
                    fico_bucket: row.fico_bucket.clone(),
                    series: WITHOUT_TERM,
                    confirmation_rate: row.confirm_rate_without_term,
                },
            ]
        })
        .collect();

    TermSelectionView { rows, series }
}
