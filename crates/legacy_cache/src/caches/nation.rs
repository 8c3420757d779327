use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{name_key, Nation, Settlement};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct NationCache {
    cache: ReplicatedCache<Nation>,
    by_name: IndexHandle<Nation, String>,
    by_capital: IndexHandle<Nation, Oid<Settlement>>,
}

impl NationCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "NationCache", options);
        let by_name = cache.add_index("name", IndexKind::Hash, |n: &Nation| n.name_key());
        let by_capital = cache.add_index("capital", IndexKind::Unique, |n: &Nation| n.capital_id);
        Self {
            cache,
            by_name,
            by_capital,
        }
    }

    /// Case-insensitive name lookup.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Nation>> {
        self.cache.query_first(&self.by_name, &name_key(name))
    }

    /// The nation whose capital is `settlement`, if any.
    pub fn get_by_capital(&self, settlement: Oid<Settlement>) -> Option<Arc<Nation>> {
        self.cache.query_first(&self.by_capital, &settlement)
    }

    pub fn names(&self) -> Vec<String> {
        self.cache.all().iter().map(|n| n.name.clone()).collect()
    }
}

impl Deref for NationCache {
    type Target = ReplicatedCache<Nation>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
