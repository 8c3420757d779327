use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub cache: String,
    pub entities: usize,
    pub indexes: usize,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    /// Events that matched the cached state exactly and were ignored.
    pub duplicates_ignored: u64,
    pub decode_failures: u64,
    pub hook_failures: u64,
    pub resyncs: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub inserts: AtomicU64,
    pub updates: AtomicU64,
    pub deletes: AtomicU64,
    pub duplicates_ignored: AtomicU64,
    pub decode_failures: AtomicU64,
    pub hook_failures: AtomicU64,
    pub resyncs: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cache: &str, entities: usize, indexes: usize) -> CacheStats {
        CacheStats {
            cache: cache.to_string(),
            entities,
            indexes,
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            duplicates_ignored: self.duplicates_ignored.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
        }
    }
}
