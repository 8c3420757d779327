//! Per-variant build access rules.
//!
//! Every rule answers with `None` when the actor may act, or with the
//! message to show them. Actors unknown to the player cache are treated as
//! belonging to no settlement and no nation.

use crate::region::{OutpostRegion, Region, SettlementRegion, TerritoryRegion, ZoneRegion};
use legacy_cache::Caches;
use legacy_db::schema::{ForeignRelation, Nation, PlayerId, RelationLevel, RolePermission, Settlement, TrustLevel};
use legacy_db::Oid;
use std::collections::BTreeSet;

/// What the access rules need to know about the acting player.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Actor {
    pub id: PlayerId,
    pub settlement: Option<Oid<Settlement>>,
    pub nation: Option<Oid<Nation>>,
}

impl Actor {
    pub fn resolve(caches: &Caches, id: PlayerId) -> Self {
        let player = caches.players.try_get(id);
        Self {
            id,
            settlement: player.as_ref().and_then(|p| p.settlement_id),
            nation: player.as_ref().and_then(|p| p.nation_id),
        }
    }
}

impl Region {
    /// `None` if `actor` may build here, otherwise the reason they may not.
    pub fn inaccess_message(&self, caches: &Caches, actor: PlayerId) -> Option<String> {
        let actor = Actor::resolve(caches, actor);
        match self {
            Region::Settlement(r) => settlement_rule(r, caches, &actor),
            Region::NationOutpost(r) => outpost_rule(r, caches, &actor),
            Region::Territory(r) => territory_rule(r, caches, &actor),
            Region::SettlementZone(r) => zone_rule(r, caches, &actor),
        }
    }
}

fn nation_name(caches: &Caches, nation: Oid<Nation>) -> String {
    caches
        .nations
        .try_get(nation)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| "an unknown nation".to_string())
}

fn settlement_rule(region: &SettlementRegion, caches: &Caches, actor: &Actor) -> Option<String> {
    // anyone can build
    if region.min_build_access == ForeignRelation::None {
        return None;
    }

    if let Some(home) = actor.settlement {
        if home == region.id {
            if region.min_build_access <= ForeignRelation::SettlementMember
                || region.leader == actor.id
                || caches.roles.has_permission(actor.id, region.id, RolePermission::Build)
            {
                return None;
            }
            return Some("You don't have the BUILD permission and minbuildaccess is STRICT!".to_string());
        }

        if let Some(theirs) = actor.nation {
            match (region.min_build_access, region.nation) {
                (ForeignRelation::NationMember, Some(ours)) if ours == theirs => return None,
                (ForeignRelation::Ally, Some(ours)) if caches.relations.relation(ours, theirs) >= RelationLevel::Ally => {
                    return None
                }
                _ => {}
            }
        }
    }

    Some(format!("This land is claimed by the settlement {}", region.name))
}

fn outpost_rule(region: &OutpostRegion, caches: &Caches, actor: &Actor) -> Option<String> {
    if let Some(theirs) = actor.nation {
        let trusted = match region.trust_level {
            TrustLevel::Nation => region.nation == theirs,
            TrustLevel::Ally => caches.relations.relation(theirs, region.nation) >= RelationLevel::Ally,
            TrustLevel::Manual => false,
        };
        if trusted || region.trusted_nations.contains(&theirs) {
            return None;
        }
    }

    if region.managers.contains(&actor.id) || region.trusted_players.contains(&actor.id) {
        return None;
    }

    Some(format!(
        "Space station {} is claimed by {} @ {},{} x {}",
        region.name,
        nation_name(caches, region.nation),
        region.x,
        region.z,
        region.radius
    ))
}

fn territory_rule(region: &TerritoryRegion, caches: &Caches, actor: &Actor) -> Option<String> {
    let Some(owner) = region.nation else {
        return Some(format!("{} is not claimed by any nation!", region.name));
    };

    if let Some(theirs) = actor.nation {
        if caches.relations.relation(theirs, owner) >= RelationLevel::Ally {
            return None;
        }
    }

    Some(format!(
        "{} is a territory claimed by {}",
        region.name,
        nation_name(caches, owner)
    ))
}

fn zone_rule(region: &ZoneRegion, caches: &Caches, actor: &Actor) -> Option<String> {
    let Some(owner) = region.owner else {
        return Some(format!("This is the settlement zone {}, and it's unclaimed", region.name));
    };

    let settlement_nation = || caches.settlements.try_get(region.settlement).and_then(|s| s.nation_id);
    let allowed_by_level = match region.min_build_access {
        None | Some(ForeignRelation::Strict) => false,
        Some(ForeignRelation::None) => true,
        Some(ForeignRelation::Ally) => match (settlement_nation(), actor.nation) {
            (Some(ours), Some(theirs)) => caches.relations.relation(ours, theirs) >= RelationLevel::Ally,
            _ => false,
        },
        Some(ForeignRelation::NationMember) => actor.nation.is_some() && settlement_nation() == actor.nation,
        Some(ForeignRelation::SettlementMember) => actor.settlement == Some(region.settlement),
    };
    if allowed_by_level || owner == actor.id {
        return None;
    }

    if trusts(&region.trusted_players, Some(actor.id))
        || trusts(&region.trusted_nations, actor.nation)
        || trusts(&region.trusted_settlements, actor.settlement)
    {
        return None;
    }

    Some(format!("This is part of the settlement zone {}", region.name))
}

fn trusts<T: Ord>(set: &Option<BTreeSet<T>>, who: Option<T>) -> bool {
    match (set, who) {
        (Some(set), Some(who)) => set.contains(&who),
        _ => false,
    }
}
