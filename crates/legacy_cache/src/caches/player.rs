use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{name_key, Nation, Player, Settlement};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

/// Every known player, by settlement, nation and last known name.
#[derive(Clone)]
pub struct PlayerCache {
    cache: ReplicatedCache<Player>,
    by_settlement: IndexHandle<Player, Oid<Settlement>>,
    by_nation: IndexHandle<Player, Oid<Nation>>,
    by_name: IndexHandle<Player, String>,
}

impl PlayerCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "PlayerCache", options);
        let by_settlement = cache.add_multi_index("settlement", IndexKind::Hash, |p: &Player| p.settlement_id);
        let by_nation = cache.add_multi_index("nation", IndexKind::Hash, |p: &Player| p.nation_id);
        let by_name = cache.add_index("name", IndexKind::Hash, |p: &Player| name_key(&p.last_known_name));
        Self {
            cache,
            by_settlement,
            by_nation,
            by_name,
        }
    }

    /// Looks a player up by last known name, ignoring case.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Player>> {
        self.cache.query_first(&self.by_name, &name_key(name))
    }

    pub fn members_of_settlement(&self, settlement: Oid<Settlement>) -> Vec<Arc<Player>> {
        self.cache.query(&self.by_settlement, &settlement)
    }

    pub fn members_of_nation(&self, nation: Oid<Nation>) -> Vec<Arc<Player>> {
        self.cache.query(&self.by_nation, &nation)
    }
}

impl Deref for PlayerCache {
    type Target = ReplicatedCache<Player>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
