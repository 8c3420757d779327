use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{name_key, Nation, NationOutpost};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct NationOutpostCache {
    cache: ReplicatedCache<NationOutpost>,
    by_name: IndexHandle<NationOutpost, String>,
    by_nation: IndexHandle<NationOutpost, Oid<Nation>>,
    by_world: IndexHandle<NationOutpost, String>,
}

impl NationOutpostCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "NationOutpostCache", options);
        let by_name = cache.add_index("name", IndexKind::Unique, |o: &NationOutpost| name_key(&o.name));
        let by_nation = cache.add_index("nation", IndexKind::Hash, |o: &NationOutpost| o.nation_id);
        let by_world = cache.add_index("world", IndexKind::Hash, |o: &NationOutpost| o.world_name.clone());
        Self {
            cache,
            by_name,
            by_nation,
            by_world,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<NationOutpost>> {
        self.cache.query_first(&self.by_name, &name_key(name))
    }

    pub fn owned_by(&self, nation: Oid<Nation>) -> Vec<Arc<NationOutpost>> {
        self.cache.query(&self.by_nation, &nation)
    }

    pub fn in_world(&self, world: &str) -> Vec<Arc<NationOutpost>> {
        self.cache.query(&self.by_world, &world.to_string())
    }
}

impl Deref for NationOutpostCache {
    type Target = ReplicatedCache<NationOutpost>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
