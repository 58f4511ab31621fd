use crate::error::FetchError;
use crate::query::table::{Cell, Table};
use crate::warehouse::{Statement, Warehouse};
use duckdb::types::Value;
use duckdb::Connection;
use std::path::Path;

/// Warehouse backed by a DuckDB database.
pub struct DuckDbWarehouse {
    conn: Connection,
}

impl DuckDbWarehouse {
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open a database file, or an in-memory database when `path` is `None`.
    pub fn open(path: Option<&Path>) -> Result<Self, FetchError> {
        let conn = match path {
            Some(p) => Connection::open(p),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| FetchError::Connection(e.to_string()))?;
        Ok(Self::new(conn))
    }

    /// Open a database file attached under `catalog`, so tables qualified as
    /// `catalog.schema.table` resolve to it. `catalog` must already be a
    /// validated identifier.
    pub fn open_as(path: &Path, catalog: &str) -> Result<Self, FetchError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        let escaped = path.to_string_lossy().replace('\'', "''");
        conn.execute_batch(&format!("ATTACH '{escaped}' AS {catalog}; USE {catalog}"))
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        tracing::debug!(path = %path.display(), catalog, "Attached warehouse database");
        Ok(Self::new(conn))
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn run(&self, statement: &Statement) -> Result<Table, duckdb::Error> {
        let mut stmt = self.conn.prepare(statement.sql())?;
        let mut rows = stmt.query(duckdb::params_from_iter(statement.params().iter()))?;

        let columns = rows
            .as_ref()
            .map(|s| s.column_names())
            .unwrap_or_default();
        let width = columns.len();
        let mut table = Table::new(columns);

        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                let value: Value = row.get(i)?;
                cells.push(to_cell(value));
            }
            table.push_row(cells);
        }
        Ok(table)
    }
}

impl Warehouse for DuckDbWarehouse {
    fn execute(&mut self, statement: &Statement) -> Result<Table, FetchError> {
        self.run(statement)
            .map_err(|e| FetchError::Query(e.to_string()))
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Boolean(b) => Cell::Int(i64::from(b)),
        Value::TinyInt(v) => Cell::Int(i64::from(v)),
        Value::SmallInt(v) => Cell::Int(i64::from(v)),
        Value::Int(v) => Cell::Int(i64::from(v)),
        Value::BigInt(v) => Cell::Int(v),
        Value::HugeInt(v) => i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int),
        Value::UTinyInt(v) => Cell::Int(i64::from(v)),
        Value::USmallInt(v) => Cell::Int(i64::from(v)),
        Value::UInt(v) => Cell::Int(i64::from(v)),
        Value::UBigInt(v) => i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int),
        Value::Float(v) => Cell::Float(f64::from(v)),
        Value::Double(v) => Cell::Float(v),
        Value::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map_or_else(|_| Cell::Text(d.to_string()), Cell::Float),
        Value::Text(s) => Cell::Text(s),
        other => Cell::Text(format!("{other:?}")),
    }
}
