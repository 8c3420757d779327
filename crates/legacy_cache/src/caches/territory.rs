use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{name_key, Nation, Territory};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct TerritoryCache {
    cache: ReplicatedCache<Territory>,
    by_name: IndexHandle<Territory, String>,
    by_nation: IndexHandle<Territory, Oid<Nation>>,
    by_world: IndexHandle<Territory, String>,
}

impl TerritoryCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "TerritoryCache", options);
        let by_name = cache.add_index("name", IndexKind::Unique, |t: &Territory| t.name_key());
        let by_nation = cache.add_multi_index("nation", IndexKind::Hash, |t: &Territory| t.nation_id);
        let by_world = cache.add_index("world", IndexKind::Hash, |t: &Territory| t.world_name.clone());
        Self {
            cache,
            by_name,
            by_nation,
            by_world,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Territory>> {
        self.cache.query_first(&self.by_name, &name_key(name))
    }

    pub fn owned_by(&self, nation: Oid<Nation>) -> Vec<Arc<Territory>> {
        self.cache.query(&self.by_nation, &nation)
    }

    pub fn in_world(&self, world: &str) -> Vec<Arc<Territory>> {
        self.cache.query(&self.by_world, &world.to_string())
    }
}

impl Deref for TerritoryCache {
    type Target = ReplicatedCache<Territory>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
