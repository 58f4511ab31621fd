use crate::query::metric_set::FunnelTable;
use duckdb::Connection;

/// Column definitions of the checkout funnel event table.
pub const FUNNEL_COLUMNS: &str = r"
    CHECKOUT_ID           VARCHAR NOT NULL,
    CHECKOUT_CREATED_DT   DATE NOT NULL,
    FICO_SCORE            INTEGER,
    TOTAL_AMOUNT          DECIMAL(12,2),
    IS_APPROVED           INTEGER NOT NULL DEFAULT 0,
    IS_CONFIRMED          INTEGER NOT NULL DEFAULT 0,
    TERM_LENGTH           INTEGER,
    OFFERED_APR1          DECIMAL(6,3),
    OFFERED_PLAN1_LENGTH  INTEGER,
    OFFERED_APR2          DECIMAL(6,3),
    OFFERED_PLAN2_LENGTH  INTEGER,
    OFFERED_APR3          DECIMAL(6,3),
    OFFERED_PLAN3_LENGTH  INTEGER
";

/// Make sure the database and schema a qualified table name points at exist.
///
/// A database that is not attached yet is attached as an in-memory catalog,
/// so a `database.schema.table` name resolves on a bare connection.
pub fn ensure_namespace(conn: &Connection, table: &FunnelTable) -> Result<(), duckdb::Error> {
    if let Some(database) = table.database() {
        let attached: i64 = conn.query_row(
            "SELECT COUNT(*) FROM duckdb_databases() WHERE database_name = ?",
            [database],
            |row| row.get(0),
        )?;
        if attached == 0 {
            conn.execute_batch(&format!("ATTACH ':memory:' AS {database}"))?;
            tracing::debug!(database, "Attached in-memory catalog");
        }
    }
    if let Some(schema) = table.qualified_schema() {
        conn.execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))?;
    }
    Ok(())
}

/// Create the namespace (if qualified) and the funnel table.
pub fn init_schema(conn: &Connection, table: &FunnelTable) -> Result<(), duckdb::Error> {
    ensure_namespace(conn, table)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} ({FUNNEL_COLUMNS})"
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::metric_set::DEFAULT_TABLE;

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        let table = FunnelTable::new(None, None, DEFAULT_TABLE).unwrap();
        init_schema(&conn, &table).unwrap();

        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM CHECKOUT_FUNNEL_V5")
            .unwrap();
        let count: i64 = stmt.query_row([], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let table = FunnelTable::new(None, Some("dbt_analytics"), DEFAULT_TABLE).unwrap();
        init_schema(&conn, &table).unwrap();
        init_schema(&conn, &table).unwrap();
    }

    #[test]
    fn test_schema_columns() {
        let conn = Connection::open_in_memory().unwrap();
        let table = FunnelTable::new(None, Some("dbt_analytics"), DEFAULT_TABLE).unwrap();
        init_schema(&conn, &table).unwrap();

        conn.execute(
            "INSERT INTO dbt_analytics.CHECKOUT_FUNNEL_V5 VALUES
             (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                "chk_1",
                "2024-01-15",
                712,
                1250.00f64,
                1,
                1,
                12,
                0.0f64,
                12,
                9.99f64,
                24,
                Option::<f64>::None,
                Option::<i32>::None
            ],
        )
        .unwrap();

        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM dbt_analytics.CHECKOUT_FUNNEL_V5")
            .unwrap();
        let count: i64 = stmt.query_row([], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_init_schema_with_database() {
        let conn = Connection::open_in_memory().unwrap();
        let table =
            FunnelTable::new(Some("PROD__US"), Some("DBT_ANALYTICS"), DEFAULT_TABLE).unwrap();
        init_schema(&conn, &table).unwrap();
        init_schema(&conn, &table).unwrap();

        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM PROD__US.DBT_ANALYTICS.CHECKOUT_FUNNEL_V5")
            .unwrap();
        let count: i64 = stmt.query_row([], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_ensure_namespace_keeps_attached_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prod.duckdb");
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!(
            "ATTACH '{}' AS PROD__US",
            path.to_string_lossy()
        ))
        .unwrap();

        let table =
            FunnelTable::new(Some("PROD__US"), Some("DBT_ANALYTICS"), DEFAULT_TABLE).unwrap();
        init_schema(&conn, &table).unwrap();

        let mut stmt = conn
            .prepare("SELECT path FROM duckdb_databases() WHERE database_name = 'PROD__US'")
            .unwrap();
        let attached: Option<String> = stmt.query_row([], |row| row.get(0)).unwrap();
        assert!(attached.is_some_and(|p| p.ends_with("prod.duckdb")));
    }
}
