use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{name_key, Settlement, SettlementZone};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct SettlementZoneCache {
    cache: ReplicatedCache<SettlementZone>,
    by_settlement: IndexHandle<SettlementZone, Oid<Settlement>>,
    by_world: IndexHandle<SettlementZone, String>,
    by_name: IndexHandle<SettlementZone, (Oid<Settlement>, String)>,
}

impl SettlementZoneCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "SettlementZoneCache", options);
        let by_settlement = cache.add_index("settlement", IndexKind::Hash, |z: &SettlementZone| z.settlement_id);
        let by_world = cache.add_index("world", IndexKind::Hash, |z: &SettlementZone| z.world_name.clone());
        // Zone names are only unique within their settlement.
        let by_name = cache.add_index("settlement_name", IndexKind::Unique, |z: &SettlementZone| {
            (z.settlement_id, name_key(&z.name))
        });
        Self {
            cache,
            by_settlement,
            by_world,
            by_name,
        }
    }

    pub fn zones_of(&self, settlement: Oid<Settlement>) -> Vec<Arc<SettlementZone>> {
        self.cache.query(&self.by_settlement, &settlement)
    }

    pub fn in_world(&self, world: &str) -> Vec<Arc<SettlementZone>> {
        self.cache.query(&self.by_world, &world.to_string())
    }

    pub fn get_by_name(&self, settlement: Oid<Settlement>, name: &str) -> Option<Arc<SettlementZone>> {
        self.cache.query_first(&self.by_name, &(settlement, name_key(name)))
    }
}

impl Deref for SettlementZoneCache {
    type Target = ReplicatedCache<SettlementZone>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
