use crate::error::FetchError;
use crate::query::cache::{CachedTable, QueryCache};
use crate::query::metric_set::{FunnelTable, MetricSet};
use crate::query::window::ReportingWindow;
use crate::warehouse::Warehouse;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Runs metric-set queries against the warehouse, memoized per
/// `(metric_set, window)` for the cache TTL.
pub struct FunnelQueryService<W> {
    warehouse: Mutex<W>,
    cache: QueryCache,
    table: FunnelTable,
    queries_executed: AtomicU64,
}

impl<W: Warehouse> FunnelQueryService<W> {
    pub fn new(warehouse: W, cache: QueryCache, table: FunnelTable) -> Self {
        Self {
            warehouse: Mutex::new(warehouse),
            cache,
            table,
            queries_executed: AtomicU64::new(0),
        }
    }

    /// Return the table for `metric_set` over `window`, from cache if a live
    /// entry exists, otherwise from the warehouse.
    ///
    /// A cache hit returns the stored table unchanged. Errors propagate without
    /// retry and leave the cache untouched. Concurrent misses on one key may
    /// each query; the last to finish wins.
    pub fn fetch(
        &self,
        window: &ReportingWindow,
        metric_set: MetricSet,
    ) -> Result<CachedTable, FetchError> {
        let key = metric_set.cache_key(window);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, fetched_at = %hit.fetched_at, "Query cache hit");
            return Ok(hit);
        }

        let statement = metric_set.statement(&self.table, window);
        let started = Instant::now();
        let result = self.warehouse.lock().execute(&statement);
        if !result.as_ref().is_err_and(FetchError::is_connection) {
            self.queries_executed.fetch_add(1, Ordering::Relaxed);
        }

        let table = match result {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(metric_set = %metric_set, error = %e, "Warehouse query failed");
                return Err(e);
            }
        };

        tracing::info!(
            metric_set = %metric_set,
            start = %window.start(),
            end = %window.end(),
            rows = table.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Warehouse query completed"
        );
        Ok(self.cache.put(key, Arc::new(table)))
    }

    pub const fn table(&self) -> &FunnelTable {
        &self.table
    }

    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Statements the warehouse answered since startup, with rows or with a
    /// query error. Fetches refused for want of a session are not counted.
    pub fn queries_executed(&self) -> u64 {
        self.queries_executed.load(Ordering::Relaxed)
    }

    /// Drop every cached result so the next fetch of each key hits the warehouse.
    pub fn invalidate(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        tracing::info!(dropped, "Query cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::query::metric_set::DEFAULT_TABLE;
    use crate::query::table::{Cell, Table};
    use crate::warehouse::Statement;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::VecDeque;

    /// Warehouse double that records statements and replays canned results.
    #[derive(Default)]
    struct FakeWarehouse {
        executed: Arc<Mutex<Vec<Statement>>>,
        responses: VecDeque<Result<Table, FetchError>>,
    }

    impl Warehouse for FakeWarehouse {
        fn execute(&mut self, statement: &Statement) -> Result<Table, FetchError> {
            self.executed.lock().push(statement.clone());
            self.responses
                .pop_front()
                .unwrap_or_else(|| Ok(Table::new(vec!["N".to_string()])))
        }
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()
    }

    fn window() -> ReportingWindow {
        ReportingWindow::parse("2024-01-01", "2024-01-07").unwrap()
    }

    fn service(
        ttl: u64,
        responses: Vec<Result<Table, FetchError>>,
    ) -> (
        FunnelQueryService<FakeWarehouse>,
        ManualClock,
        Arc<Mutex<Vec<Statement>>>,
    ) {
        let clock = ManualClock::new(t0());
        let executed = Arc::new(Mutex::new(Vec::new()));
        let wh = FakeWarehouse {
            executed: Arc::clone(&executed),
            responses: responses.into(),
        };
        let cache = QueryCache::new(ttl, Arc::new(clock.clone()));
        let table = FunnelTable::new(None, None, DEFAULT_TABLE).unwrap();
        (FunnelQueryService::new(wh, cache, table), clock, executed)
    }

    #[test]
    fn test_two_fetches_within_ttl_query_once() {
        let (svc, clock, executed) = service(3600, Vec::new());
        let first = svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        clock.advance(Duration::seconds(3599));
        let second = svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        assert_eq!(executed.lock().len(), 1);
        assert!(Arc::ptr_eq(&first.table, &second.table));
        assert_eq!(second.fetched_at, t0());
    }

    #[test]
    fn test_fetch_after_ttl_queries_again_and_replaces_entry() {
        let (svc, clock, executed) = service(3600, Vec::new());
        svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        clock.advance(Duration::seconds(3599));
        svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        clock.advance(Duration::seconds(2));
        let refreshed = svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        assert_eq!(executed.lock().len(), 2);
        assert_eq!(refreshed.fetched_at, t0() + Duration::seconds(3601));
        assert_eq!(svc.cache().len(), 1);
        assert_eq!(svc.queries_executed(), 2);
    }

    #[test]
    fn test_distinct_keys_query_separately() {
        let (svc, _clock, executed) = service(3600, Vec::new());
        svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        svc.fetch(&window(), MetricSet::AovDropoff).unwrap();
        let other = ReportingWindow::parse("2024-01-02", "2024-01-07").unwrap();
        svc.fetch(&other, MetricSet::FicoDropoff).unwrap();
        assert_eq!(executed.lock().len(), 3);
    }

    #[test]
    fn test_errors_propagate_and_are_not_cached() {
        let (svc, _clock, executed) = service(
            3600,
            vec![
                Err(FetchError::Query("permission denied".to_string())),
                Err(FetchError::Connection("timed out".to_string())),
            ],
        );
        assert!(matches!(
            svc.fetch(&window(), MetricSet::ZeroApr),
            Err(FetchError::Query(_))
        ));
        assert!(matches!(
            svc.fetch(&window(), MetricSet::ZeroApr),
            Err(FetchError::Connection(_))
        ));
        svc.fetch(&window(), MetricSet::ZeroApr).unwrap();
        assert_eq!(executed.lock().len(), 3);
        assert_eq!(svc.cache().len(), 1);
    }

    #[test]
    fn test_refused_session_not_counted_as_query() {
        let (svc, _clock, _executed) = service(
            3600,
            vec![
                Err(FetchError::Connection("no session".to_string())),
                Err(FetchError::Query("syntax error".to_string())),
            ],
        );
        assert!(svc.fetch(&window(), MetricSet::FicoDropoff).is_err());
        assert_eq!(svc.queries_executed(), 0);
        assert!(svc.fetch(&window(), MetricSet::FicoDropoff).is_err());
        assert_eq!(svc.queries_executed(), 1);
        svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        assert_eq!(svc.queries_executed(), 2);
    }

    #[test]
    fn test_empty_result_is_ok() {
        let (svc, _clock, _executed) = service(3600, Vec::new());
        let fetched = svc.fetch(&window(), MetricSet::TermConfirmation).unwrap();
        assert!(fetched.table.is_empty());
    }

    #[test]
    fn test_hit_returns_table_unchanged() {
        let canned = Table::from_rows(
            &["FICO_SCORE_BUCKET", "APPROVED", "TERM_SELECTED"],
            vec![vec![
                Cell::Text("Good (670-739)".to_string()),
                Cell::Int(100),
                Cell::Int(80),
            ]],
        );
        let (svc, _clock, _executed) = service(3600, vec![Ok(canned.clone())]);
        svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        let hit = svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        assert_eq!(*hit.table, canned);
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let (svc, _clock, executed) = service(3600, Vec::new());
        svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        svc.invalidate();
        svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        assert_eq!(executed.lock().len(), 2);
    }

    #[test]
    fn test_statement_targets_configured_table() {
        let (svc, _clock, executed) = service(3600, Vec::new());
        svc.fetch(&window(), MetricSet::FicoDropoff).unwrap();
        let sql = executed.lock()[0].sql().to_string();
        assert!(sql.contains("FROM CHECKOUT_FUNNEL_V5"));
    }
}
