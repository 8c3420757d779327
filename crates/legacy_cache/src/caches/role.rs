use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use legacy_db::schema::{PlayerId, RolePermission, Settlement, SettlementRole};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
pub struct SettlementRoleCache {
    cache: ReplicatedCache<SettlementRole>,
    by_settlement: IndexHandle<SettlementRole, Oid<Settlement>>,
    by_member: IndexHandle<SettlementRole, PlayerId>,
}

impl SettlementRoleCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, "SettlementRoleCache", options);
        let by_settlement = cache.add_index("settlement", IndexKind::Hash, |r: &SettlementRole| r.parent);
        let by_member = cache.add_multi_index("member", IndexKind::Hash, |r: &SettlementRole| {
            r.members.iter().copied().collect::<Vec<_>>()
        });
        Self {
            cache,
            by_settlement,
            by_member,
        }
    }

    pub fn roles_of(&self, settlement: Oid<Settlement>) -> Vec<Arc<SettlementRole>> {
        self.cache.query(&self.by_settlement, &settlement)
    }

    pub fn roles_of_member(&self, player: PlayerId) -> Vec<Arc<SettlementRole>> {
        self.cache.query(&self.by_member, &player)
    }

    /// Whether any of `player`'s roles in `settlement` grants `permission`.
    pub fn has_permission(&self, player: PlayerId, settlement: Oid<Settlement>, permission: RolePermission) -> bool {
        self.roles_of_member(player)
            .iter()
            .any(|role| role.parent == settlement && role.grants(permission))
    }
}

impl Deref for SettlementRoleCache {
    type Target = ReplicatedCache<SettlementRole>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}
