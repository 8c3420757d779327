use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{name_key, Nation, Settlement};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct SettlementCache {
    cache: ReplicatedCache<Settlement>,
    by_name: IndexHandle<Settlement, String>,
    by_world: IndexHandle<Settlement, String>,
    by_nation: IndexHandle<Settlement, Oid<Nation>>,
}

impl SettlementCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "SettlementCache", options);
        let by_name = cache.add_index("name", IndexKind::Unique, |s: &Settlement| s.name_key());
        let by_world = cache.add_index("world", IndexKind::Hash, |s: &Settlement| s.world_name.clone());
        let by_nation = cache.add_multi_index("nation", IndexKind::Hash, |s: &Settlement| s.nation_id);
        Self {
            cache,
            by_name,
            by_world,
            by_nation,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Settlement>> {
        self.cache.query_first(&self.by_name, &name_key(name))
    }

    pub fn in_world(&self, world: &str) -> Vec<Arc<Settlement>> {
        self.cache.query(&self.by_world, &world.to_string())
    }

    pub fn in_nation(&self, nation: Oid<Nation>) -> Vec<Arc<Settlement>> {
        self.cache.query(&self.by_nation, &nation)
    }
}

impl Deref for SettlementCache {
    type Target = ReplicatedCache<Settlement>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
