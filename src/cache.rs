use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::CacheConfig;
use crate::model::LogRecord;

struct CacheEntry {
    record: LogRecord,
    inserted_at: Instant,
}

/// In-memory record cache keyed by log id, bounded by age and entry count.
///
/// Cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct LogCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Option<Duration>,
    max_entries: usize,
}

impl LogCache {
    /// `ttl: None` never expires entries. `max_entries` is at least 1.
    pub fn new(ttl: Option<Duration>, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: Arc::new(Mutex::new(HashMap::with_capacity(max_entries.min(1024)))),
            ttl,
            max_entries,
        }
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self::new(cfg.ttl(), cfg.max_entries)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Stores or overwrites `id`. Adding a new key to a full cache first
    /// evicts the oldest entries, at least 10% of capacity per pass.
    pub fn add(&self, id: impl Into<String>, record: LogRecord) {
        let id = id.into();
        let mut entries = self.entries.lock();
        if !entries.contains_key(&id) && entries.len() >= self.max_entries {
            let evicted = self.evict_oldest(&mut entries);
            debug!(evicted, remaining = entries.len(), "log cache eviction");
        }
        entries.insert(
            id,
            CacheEntry {
                record,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Returns a copy of the record unless it is missing or older than the TTL.
    /// Stale entries are dropped on the way out.
    pub fn get(&self, id: &str) -> Option<LogRecord> {
        let mut entries = self.entries.lock();
        let entry = entries.get(id)?;
        if self.is_expired(entry) {
            entries.remove(id);
            debug!(id, "log cache entry expired");
            return None;
        }
        Some(entry.record.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        match self.ttl {
            Some(ttl) => entry.inserted_at.elapsed() > ttl,
            None => false,
        }
    }

    fn evict_oldest(&self, entries: &mut HashMap<String, CacheEntry>) -> usize {
        let overflow = (entries.len() + 1).saturating_sub(self.max_entries);
        let batch = (self.max_entries / 10).max(1);
        let count = overflow.max(batch).min(entries.len());

        let mut by_age: Vec<(Instant, String)> = entries
            .iter()
            .map(|(k, e)| (e.inserted_at, k.clone()))
            .collect();
        by_age.sort_unstable();
        for (_, key) in by_age.into_iter().take(count) {
            entries.remove(&key);
        }
        count
    }
}

impl Default for LogCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
