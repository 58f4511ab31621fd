use crate::query::buckets::ZeroAprBucket;
use crate::query::table::Table;
use crate::views::{rate, round_to};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroAprRow {
    pub zero_apr_bucket: String,
    pub total_approved: u64,
    pub completed: u64,
    pub dropped_off: u64,
    pub completion_rate: Option<f64>,
    pub dropoff_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroAprView {
    pub rows: Vec<ZeroAprRow>,
}

/// Completion vs dropoff for $1000+ approved orders by 0% APR offer length.
pub fn zero_apr(table: &Table) -> ZeroAprView {
    let mut rows: Vec<ZeroAprRow> = table
        .records()
        .map(|r| {
            let total = r.count("TOTAL_APPROVED");
            let completed = r.count("COMPLETED");
            let dropped_off = r.count("DROPPED_OFF");
            ZeroAprRow {
                zero_apr_bucket: r.label("ZERO_APR_BUCKET", ZeroAprBucket::None.label()).to_string(),
                total_approved: total,
                completed,
                dropped_off,
                completion_rate: round_to(rate(completed, total), 1),
                dropoff_rate: round_to(rate(dropped_off, total), 1),
            }
        })
        .collect();
    rows.sort_by_key(|row| {
        ZeroAprBucket::from_label(&row.zero_apr_bucket)
            .and_then(|b| ZeroAprBucket::ALL.iter().position(|x| *x == b))
            .unwrap_or(ZeroAprBucket::ALL.len())
    });
    ZeroAprView { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::table::Cell;

    fn table(rows: &[(&str, i64, i64, i64)]) -> Table {
        Table::from_rows(
            &["ZERO_APR_BUCKET", "TOTAL_APPROVED", "COMPLETED", "DROPPED_OFF"],
            rows.iter()
                .map(|(b, t, c, d)| {
                    vec![
                        Cell::Text((*b).to_string()),
                        Cell::Int(*t),
                        Cell::Int(*c),
                        Cell::Int(*d),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn test_completion_and_dropoff_rates() {
        let view = zero_apr(&table(&[
            ("d. 0% for 13+ mo", 200, 149, 51),
            ("a. No 0% APR", 500, 233, 267),
        ]));
        assert_eq!(view.rows[0].zero_apr_bucket, "a. No 0% APR");
        assert_eq!(view.rows[0].completion_rate, Some(46.6));
        assert_eq!(view.rows[0].dropoff_rate, Some(53.4));
        assert_eq!(view.rows[1].completion_rate, Some(74.5));
    }

    #[test]
    fn test_zero_total_has_no_rates() {
        let view = zero_apr(&table(&[("b. 0% for 1-6 mo", 0, 0, 0)]));
        assert_eq!(view.rows[0].completion_rate, None);
        assert_eq!(view.rows[0].dropoff_rate, None);
    }
}
