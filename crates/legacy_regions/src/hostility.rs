use crate::access::Actor;
use crate::region::Region;
use crate::regions::Regions;
use legacy_db::schema::{PlayerId, RelationLevel};
use legacy_db::Location;

impl Regions {
    /// Whether `actor` is standing somewhere hostile to their nation.
    ///
    /// Settlements decide alone: the first settlement found answers with its
    /// nation's relation. Outposts of enemy nations and bastions held by
    /// anyone short of the actor's own nation are hostile. Players without a
    /// nation are never in hostile land.
    pub fn is_hostile(&self, actor: PlayerId, location: &Location) -> bool {
        let Some(theirs) = Actor::resolve(self.caches(), actor).nation else {
            return false;
        };
        let relations = &self.caches().relations;

        for handle in self.find(location) {
            let region = handle.read();
            match &*region {
                Region::Settlement(settlement) => {
                    let Some(ours) = settlement.nation else { continue };
                    return relations.relation(ours, theirs) <= RelationLevel::Enemy;
                }
                Region::NationOutpost(outpost) => {
                    if relations.relation(outpost.nation, theirs) <= RelationLevel::Enemy {
                        return true;
                    }
                }
                Region::Territory(territory) => {
                    let Some(cached) = self.caches().territories.try_get(territory.id) else { continue };
                    let occupier = cached
                        .nearest_bastion(location.block())
                        .and_then(|bastion| bastion.occupier_id);
                    if let Some(occupier) = occupier {
                        if relations.relation(occupier, theirs) <= RelationLevel::Ally {
                            return true;
                        }
                    }
                }
                Region::SettlementZone(_) => {}
            }
        }
        false
    }
}
