use crate::query::metric_set::FunnelTable;
use crate::storage::schema::ensure_namespace;
use duckdb::Connection;

/// Exposes exported funnel Parquet files as the funnel table.
///
/// The pattern may be a single file or a glob, e.g.
/// ```text
/// exports/checkout_funnel/date=*/*.parquet
/// ```
pub struct ParquetSource {
    pattern: String,
}

impl ParquetSource {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
        }
    }

    /// Replace `table` with a view over the Parquet files.
    pub fn attach(&self, conn: &Connection, table: &FunnelTable) -> Result<(), SourceError> {
        if self.pattern.is_empty() {
            return Err(SourceError::EmptyPattern);
        }
        ensure_namespace(conn, table).map_err(SourceError::Attach)?;

        // Note: DuckDB does not accept a bound parameter as a view's file list.
        // The pattern comes from operator configuration and is quote-escaped.
        let escaped = self.pattern.replace('\'', "''");
        conn.execute_batch(&format!(
            "CREATE OR REPLACE VIEW {table} AS SELECT * FROM read_parquet('{escaped}', union_by_name = true)"
        ))
        .map_err(SourceError::Attach)?;

        // Touch the view so a bad pattern fails at startup rather than on first render.
        conn.execute_batch(&format!("SELECT * FROM {table} LIMIT 0"))
            .map_err(SourceError::Read)?;

        tracing::info!(pattern = %self.pattern, table = %table, "Attached Parquet funnel source");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Parquet source pattern is empty")]
    EmptyPattern,
    #[error("Attach error: {0}")]
    Attach(#[source] duckdb::Error),
    #[error("Read error: {0}")]
    Read(#[source] duckdb::Error),
}
