use crate::clock::Clock;
use crate::query::table::Table;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Query result cache with TTL-based expiration.
///
/// Expiry is checked lazily on lookup; stale entries stay in the map until
/// they are overwritten or swept by [`QueryCache::cleanup_expired`].
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<String, CachedTable>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

/// A cached result and the time it was fetched.
#[derive(Debug, Clone)]
pub struct CachedTable {
    pub table: Arc<Table>,
    pub fetched_at: DateTime<Utc>,
}

impl QueryCache {
    /// Create a new cache with the given TTL in seconds.
    /// A TTL of 0 disables caching (all lookups miss).
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(
                i64::try_from(ttl_secs)
                    .unwrap_or(i64::MAX)
                    .min(i64::MAX / 1000),
            ),
            clock,
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_live(&self, entry: &CachedTable, now: DateTime<Utc>) -> bool {
        now - entry.fetched_at < self.ttl
    }

    /// Look up a cached table by key. Returns `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<CachedTable> {
        if self.ttl.is_zero() {
            return None;
        }
        let now = self.clock.now();
        self.entries
            .lock()
            .get(key)
            .filter(|entry| self.is_live(entry, now))
            .cloned()
    }

    /// Store a table under `key`, replacing any previous entry wholesale.
    pub fn put(&self, key: String, table: Arc<Table>) -> CachedTable {
        let entry = CachedTable {
            table,
            fetched_at: self.clock.now(),
        };
        if !self.ttl.is_zero() {
            self.entries.lock().insert(key, entry.clone());
        }
        entry
    }

    /// Remove expired entries from the cache.
    pub fn cleanup_expired(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| self.is_live(entry, now));
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns the number of entries currently in the cache.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the cache contains no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
