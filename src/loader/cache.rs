use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::table::{Table, TableReport};

/// Time source for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for exercising the freshness window.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|p| p.into_inner());
        self.base + offset
    }
}

/// One successful fetch, replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct CachedTable {
    pub table: Arc<Table>,
    pub report: TableReport,
    pub fetched_at: Instant,
}

impl CachedTable {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// Time-boxed memo of loaded tables keyed by source locator.
#[derive(Debug, Default)]
pub struct TableCache {
    entries: Mutex<HashMap<String, CachedTable>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key` if it is younger than `ttl`.
    pub fn get_fresh(&self, key: &str, now: Instant, ttl: Duration) -> Option<CachedTable> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries
            .get(key)
            .filter(|c| c.is_fresh(now, ttl))
            .cloned()
    }

    pub fn replace(&self, key: &str, entry: CachedTable) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert(key.to_string(), entry);
    }

    pub fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(at: Instant) -> CachedTable {
        CachedTable {
            table: Arc::new(Table::default()),
            report: crate::table::parse_table("Date\n2024/1/1\n").unwrap().1,
            fetched_at: at,
        }
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now() - t0, Duration::from_secs(30));
    }

    #[test]
    fn test_freshness_window() {
        let clock = ManualClock::new();
        let cached = entry(clock.now());
        let ttl = Duration::from_secs(600);
        assert!(cached.is_fresh(clock.now(), ttl));
        clock.advance(Duration::from_secs(599));
        assert!(cached.is_fresh(clock.now(), ttl));
        clock.advance(Duration::from_secs(1));
        assert!(!cached.is_fresh(clock.now(), ttl));
    }

    #[test]
    fn test_get_fresh_and_replace() {
        let clock = ManualClock::new();
        let cache = TableCache::new();
        let ttl = Duration::from_secs(60);
        assert!(cache.get_fresh("k", clock.now(), ttl).is_none());
        cache.replace("k", entry(clock.now()));
        assert!(cache.get_fresh("k", clock.now(), ttl).is_some());
        clock.advance(Duration::from_secs(61));
        assert!(cache.get_fresh("k", clock.now(), ttl).is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate("k"));
        assert!(cache.is_empty());
    }
}
