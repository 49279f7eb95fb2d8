// =============================================================================
// Universe Cache — ranked symbol list, bounded by age and by number of reads
// =============================================================================
//
// The ranked universe changes slowly but is expensive to fetch (the 24h
// ticker endpoint is one of the heaviest in request weight).  An entry is
// served until it is `ttl` old or has been read `max_hits` times, whichever
// comes first; the next read then misses and the caller refetches.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::FetchError;
use crate::market_data::MarketDataSource;

#[derive(Debug)]
struct Entry {
    symbols: Arc<Vec<String>>,
    fetched_at: Instant,
    hits: u32,
}

#[derive(Debug)]
pub struct UniverseCache {
    ttl: Duration,
    max_hits: u32,
    entry: Mutex<Option<Entry>>,
}

impl UniverseCache {
    pub fn new(ttl: Duration, max_hits: u32) -> Self {
        Self {
            ttl,
            max_hits: max_hits.max(1),
            entry: Mutex::new(None),
        }
    }

    /// Cached universe, counting one hit.  Expired entries are dropped.
    pub fn get(&self) -> Option<Arc<Vec<String>>> {
        let mut guard = self.entry.lock();
        let expired = match guard.as_ref() {
            Some(e) => e.fetched_at.elapsed() >= self.ttl || e.hits >= self.max_hits,
            None => return None,
        };
        if expired {
            debug!("universe cache entry expired");
            *guard = None;
            return None;
        }
        let entry = guard.as_mut()?;
        entry.hits += 1;
        Some(Arc::clone(&entry.symbols))
    }

    /// Replace the cached universe; the new entry starts with zero hits.
    pub fn refresh(&self, symbols: Vec<String>) -> Arc<Vec<String>> {
        self.store(symbols, 0)
    }

    fn store(&self, symbols: Vec<String>, hits: u32) -> Arc<Vec<String>> {
        let symbols = Arc::new(symbols);
        *self.entry.lock() = Some(Entry {
            symbols: Arc::clone(&symbols),
            fetched_at: Instant::now(),
            hits,
        });
        symbols
    }

    pub fn expire(&self) {
        *self.entry.lock() = None;
    }

    /// Cached universe, or fetch the top `limit` pairs from `source`.
    ///
    /// The fetch runs without holding the lock.  A fresh fetch counts as the
    /// entry's first hit.
    pub async fn get_or_fetch<S: MarketDataSource>(
        &self,
        source: &S,
        quote_asset: &str,
        limit: usize,
    ) -> Result<Arc<Vec<String>>, FetchError> {
        if let Some(symbols) = self.get() {
            debug!(count = symbols.len(), "universe served from cache");
            return Ok(symbols);
        }
        let symbols = source.list_ranked_symbols(quote_asset, limit).await?;
        debug!(count = symbols.len(), "universe fetched from source");
        Ok(self.store(symbols, 1))
    }
}
