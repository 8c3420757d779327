use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{name_key, EcoStation};
use legacy_db::Database;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct EcoStationCache {
    cache: ReplicatedCache<EcoStation>,
    by_name: IndexHandle<EcoStation, String>,
}

impl EcoStationCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "EcoStationCache", options);
        let by_name = cache.add_index("name", IndexKind::Unique, |s: &EcoStation| name_key(&s.name));
        Self { cache, by_name }
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<EcoStation>> {
        self.cache.query_first(&self.by_name, &name_key(name))
    }
}

impl Deref for EcoStationCache {
    type Target = ReplicatedCache<EcoStation>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
