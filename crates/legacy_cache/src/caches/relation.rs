use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{Nation, NationRelation, RelationLevel};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

/// Directed nation relations, one record per `(nation, other)` pair.
#[derive(Clone)]
pub struct RelationCache {
    cache: ReplicatedCache<NationRelation>,
    by_nation: IndexHandle<NationRelation, Oid<Nation>>,
    by_other: IndexHandle<NationRelation, Oid<Nation>>,
    by_pair: IndexHandle<NationRelation, (Oid<Nation>, Oid<Nation>)>,
}

impl RelationCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "RelationCache", options);
        let by_nation = cache.add_index("nation", IndexKind::Hash, |r: &NationRelation| r.nation_id);
        let by_other = cache.add_index("other", IndexKind::Hash, |r: &NationRelation| r.other_id);
        let by_pair = cache.add_index("pair", IndexKind::Unique, |r: &NationRelation| (r.nation_id, r.other_id));
        Self {
            cache,
            by_nation,
            by_other,
            by_pair,
        }
    }

    pub fn record(&self, nation: Oid<Nation>, other: Oid<Nation>) -> Option<Arc<NationRelation>> {
        self.cache.query_first(&self.by_pair, &(nation, other))
    }

    /// The effective relation between two nations. A nation is always
    /// `Nation` to itself; pairs without a record are `None`.
    pub fn relation(&self, nation: Oid<Nation>, other: Oid<Nation>) -> RelationLevel {
        if nation == other {
            return RelationLevel::Nation;
        }
        self.record(nation, other)
            .map(|r| r.actual)
            .unwrap_or_default()
    }

    /// What `nation` wishes its relation with `other` to be.
    pub fn wish(&self, nation: Oid<Nation>, other: Oid<Nation>) -> RelationLevel {
        if nation == other {
            return RelationLevel::Nation;
        }
        self.record(nation, other).map(|r| r.wish).unwrap_or_default()
    }

    /// Relations held by `nation` toward others.
    pub fn relations_of(&self, nation: Oid<Nation>) -> Vec<Arc<NationRelation>> {
        self.cache.query(&self.by_nation, &nation)
    }

    /// Relations other nations hold toward `nation`.
    pub fn relations_toward(&self, nation: Oid<Nation>) -> Vec<Arc<NationRelation>> {
        self.cache.query(&self.by_other, &nation)
    }
}

impl Deref for RelationCache {
    type Target = ReplicatedCache<NationRelation>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
