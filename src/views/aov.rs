use crate::query::buckets::{AovBucket, FicoGroup};
use crate::query::table::Table;
use crate::views::{rate, round_to, ChartPoint};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AovDropoffRow {
    pub aov_bucket: String,
    pub approved: u64,
    pub dropped_off: u64,
    pub dropoff_pct: Option<f64>,
}

/// Dropoff percentages pivoted to FICO group rows x AOV bucket columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub rows: Vec<&'static str>,
    pub columns: Vec<&'static str>,
    /// `values[row][column]`; `None` where the warehouse returned no cell
    /// or nothing was approved.
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AovView {
    pub rows: Vec<AovDropoffRow>,
    pub chart: Vec<ChartPoint>,
    pub heatmap: Heatmap,
}

/// Derive the AOV dropoff table from an `AovDropoff` result and the heatmap
/// from a `FicoAovMatrix` result.
pub fn aov_analysis(dropoff: &Table, matrix: &Table) -> AovView {
    let mut rows: Vec<AovDropoffRow> = dropoff
        .records()
        .filter(|r| !r.get("AOV_BUCKET").is_null())
        .map(|r| {
            let approved = r.count("APPROVED");
            let dropped_off = r.count("DROPPED_OFF");
            AovDropoffRow {
                aov_bucket: r.label("AOV_BUCKET", "").to_string(),
                approved,
                dropped_off,
                dropoff_pct: round_to(rate(dropped_off, approved), 1),
            }
        })
        .collect();
    rows.sort_by(|a, b| a.aov_bucket.cmp(&b.aov_bucket));

    let chart = rows
        .iter()
        .map(|row| ChartPoint {
            label: row.aov_bucket.clone(),
            value: row.dropoff_pct,
        })
        .collect();

    AovView {
        rows,
        chart,
        heatmap: heatmap(matrix),
    }
}

/// Pivot a `FicoAovMatrix` result into a fixed 4x4 grid. Groups or buckets
/// outside the fixed axes are dropped.
pub fn heatmap(matrix: &Table) -> Heatmap {
    let mut values = vec![vec![None; AovBucket::ALL.len()]; FicoGroup::ALL.len()];
    for r in matrix.records() {
        let group = r.get("FICO_GROUP").as_str().and_then(FicoGroup::from_label);
        let bucket = r.get("AOV_BUCKET").as_str().and_then(AovBucket::from_label);
        let (Some(group), Some(bucket)) = (group, bucket) else {
            continue;
        };
        let row = FicoGroup::ALL.iter().position(|g| *g == group);
        let col = AovBucket::ALL.iter().position(|b| *b == bucket);
        if let (Some(row), Some(col)) = (row, col) {
            values[row][col] = round_to(rate(r.count("DROPPED_OFF"), r.count("APPROVED")), 1);
        }
    }
    Heatmap {
        rows: FicoGroup::ALL.iter().map(|g| g.label()).collect(),
        columns: AovBucket::ALL.iter().map(|b| b.short_label()).collect(),
        values,
    }
}
