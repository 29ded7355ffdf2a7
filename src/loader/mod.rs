//! Table loader: fetch, parse, prune, memoize.
//!
//! A load either yields a complete table or a `LoadError`; nothing partial
//! is ever returned or cached. Within the freshness window repeated loads
//! of the same locator reuse the cached table without touching the source.

use std::sync::Arc;
use std::time::Duration;

use crate::error::LoadError;
use crate::logging::{log_cache, log_soft_failure, log_table_loaded, Domain};
use crate::source::{SheetLocator, SheetSource};
use crate::table::{parse_table, Table, TableReport};

pub mod cache;

pub use cache::{CachedTable, Clock, ManualClock, SystemClock, TableCache};

/// Default freshness window (10 minutes).
pub const DEFAULT_TTL_SECS: u64 = 600;

/// A table handed to the engine, plus where it came from.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub table: Arc<Table>,
    pub report: TableReport,
    pub from_cache: bool,
}

/// Body-composition sheet plus an optional training log.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub body: SheetLocator,
    pub training: Option<SheetLocator>,
}

/// Per-source outcomes; each source fails independently.
#[derive(Debug)]
pub struct LoadedSources {
    pub body: Result<Loaded, LoadError>,
    pub training: Option<Result<Loaded, LoadError>>,
}

pub struct TableLoader<S: SheetSource> {
    source: S,
    clock: Arc<dyn Clock>,
    cache: TableCache,
    ttl: Duration,
}

impl<S: SheetSource> TableLoader<S> {
    pub fn new(source: S) -> Self {
        Self::with_clock(source, Arc::new(SystemClock), DEFAULT_TTL_SECS)
    }

    pub fn with_clock(source: S, clock: Arc<dyn Clock>, ttl_secs: u64) -> Self {
        Self {
            source,
            clock,
            cache: TableCache::new(),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    /// Load one sheet, served from cache while fresh.
    pub async fn load(&self, locator: &SheetLocator) -> Result<Loaded, LoadError> {
        let key = locator.cache_key();
        let now = self.clock.now();
        if let Some(cached) = self.cache.get_fresh(&key, now, self.ttl) {
            log_cache(
                &locator.label,
                "cache_hit",
                cached.age(now).as_secs_f64(),
                self.ttl.as_secs(),
            );
            return Ok(Loaded {
                table: cached.table,
                report: cached.report,
                from_cache: true,
            });
        }
        log_cache(&locator.label, "cache_miss", 0.0, self.ttl.as_secs());

        let result = self.fetch_and_parse(locator).await;
        match result {
            Ok((table, report)) => {
                let table = Arc::new(table);
                log_table_loaded(&locator.label, &report);
                self.cache.replace(
                    &key,
                    CachedTable {
                        table: Arc::clone(&table),
                        report: report.clone(),
                        fetched_at: self.clock.now(),
                    },
                );
                Ok(Loaded {
                    table,
                    report,
                    from_cache: false,
                })
            }
            Err(err) => {
                log_soft_failure(Domain::Fetch, err.kind(), &locator.label, &err.to_string());
                Err(err)
            }
        }
    }

    async fn fetch_and_parse(&self, locator: &SheetLocator) -> Result<(Table, TableReport), LoadError> {
        let body = self.source.fetch_csv(locator).await?;
        parse_table(&body)
    }

    /// Load every configured source concurrently, each in its own failure domain.
    pub async fn load_sources(&self, set: &SourceSet) -> LoadedSources {
        match &set.training {
            Some(training) => {
                let (body, training) = tokio::join!(self.load(&set.body), self.load(training));
                LoadedSources {
                    body,
                    training: Some(training),
                }
            }
            None => LoadedSources {
                body: self.load(&set.body).await,
                training: None,
            },
        }
    }

    /// Drop the cached entry so the next load refetches.
    pub fn invalidate(&self, locator: &SheetLocator) -> bool {
        self.cache.invalidate(&locator.cache_key())
    }
}
