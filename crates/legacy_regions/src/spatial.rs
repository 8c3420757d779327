//! Spatial lookup structures for top-level regions.
//!
//! Settlements are found through a hash map keyed by `(world, chunk)`.
//! Circular regions are stored as horizontal bounding boxes in a per-world
//! R*-tree; a tree hit is only a candidate until the region's exact
//! containment check agrees.

use crate::region::{Region, RegionKey};
use compact_str::CompactString;
use legacy_db::geometry::ChunkKey;
use legacy_db::schema::Settlement;
use legacy_db::Oid;
use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};
use std::collections::HashMap;
use tracing::warn;

/// Bounding box of one circular region.
#[derive(Debug, Clone, PartialEq)]
struct Footprint {
    key: RegionKey,
    envelope: AABB<[i64; 2]>,
}

impl RTreeObject for Footprint {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for Footprint {
    /// Zero anywhere inside the box.
    fn distance_2(&self, point: &[i64; 2]) -> i64 {
        self.envelope.distance_2(point)
    }
}

#[derive(Default)]
pub(crate) struct SpatialIndex {
    claims: HashMap<(CompactString, ChunkKey), Oid<Settlement>>,
    trees: HashMap<CompactString, RTree<Footprint>>,
}

impl SpatialIndex {
    /// Registers the footprint of `region` as it is now.
    pub fn insert(&mut self, region: &Region) {
        match region {
            Region::Settlement(r) => {
                for chunk in &r.chunks {
                    let slot = (r.world.clone(), *chunk);
                    if let Some(previous) = self.claims.insert(slot, r.id) {
                        if previous != r.id {
                            warn!(chunk, world = %r.world, holder = %previous, claimant = %r.id, "⚠️ chunk claimed twice");
                        }
                    }
                }
            }
            _ => {
                if let Some((min, max)) = region.circle_bounds() {
                    self.trees
                        .entry(CompactString::from(region.world()))
                        .or_default()
                        .insert(Footprint {
                            key: region.key(),
                            envelope: AABB::from_corners(min, max),
                        });
                }
            }
        }
    }

    /// Unregisters the footprint `region` had when it was last inserted.
    pub fn remove(&mut self, region: &Region) {
        match region {
            Region::Settlement(r) => {
                for chunk in &r.chunks {
                    let slot = (r.world.clone(), *chunk);
                    if self.claims.get(&slot) == Some(&r.id) {
                        self.claims.remove(&slot);
                    }
                }
            }
            _ => {
                let Some((min, max)) = region.circle_bounds() else { return };
                let footprint = Footprint {
                    key: region.key(),
                    envelope: AABB::from_corners(min, max),
                };
                if let Some(tree) = self.trees.get_mut(region.world()) {
                    tree.remove(&footprint);
                    if tree.size() == 0 {
                        self.trees.remove(region.world());
                    }
                }
            }
        }
    }

    pub fn settlement_at(&self, world: &str, chunk: ChunkKey) -> Option<Oid<Settlement>> {
        self.claims.get(&(CompactString::from(world), chunk)).copied()
    }

    /// Circular regions whose bounding box covers block `(x, z)`.
    pub fn circles_at(&self, world: &str, x: i32, z: i32) -> Vec<RegionKey> {
        let Some(tree) = self.trees.get(world) else {
            return Vec::new();
        };
        tree.locate_within_distance([i64::from(x), i64::from(z)], 0)
            .map(|footprint| footprint.key)
            .collect()
    }

    #[cfg(test)]
    fn claim_count(&self) -> usize {
        self.claims.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::TerritoryRegion;
    use legacy_db::Oid;

    fn territory(x: i32, z: i32, radius: i32) -> Region {
        Region::Territory(TerritoryRegion {
            id: Oid::new(),
            name: "Ridge".into(),
            world: "planet".into(),
            x,
            z,
            radius,
            nation: None,
        })
    }

    #[test]
    fn circles_are_found_by_bounding_box() {
        let mut index = SpatialIndex::default();
        let region = territory(0, 0, 50);
        index.insert(&region);

        assert_eq!(index.circles_at("planet", 50, 50), vec![region.key()]);
        assert!(index.circles_at("planet", 51, 0).is_empty());
        assert!(index.circles_at("elsewhere", 0, 0).is_empty());

        index.remove(&region);
        assert!(index.circles_at("planet", 0, 0).is_empty());
    }

    #[test]
    fn removing_a_stale_claim_keeps_the_new_holder() {
        use crate::region::SettlementRegion;
        use legacy_db::geometry::chunk_key;
        use legacy_db::schema::ForeignRelation;
        use std::collections::{BTreeSet, HashSet};

        let settlement = |chunks: &[ChunkKey]| SettlementRegion {
            id: Oid::new(),
            name: "S".into(),
            world: "overworld".into(),
            leader: Oid::new(),
            nation: None,
            chunks: chunks.iter().copied().collect::<HashSet<_>>(),
            min_build_access: ForeignRelation::SettlementMember,
            children: BTreeSet::new(),
        };
        let first = Region::Settlement(settlement(&[chunk_key(0, 0)]));
        let second = settlement(&[chunk_key(0, 0)]);
        let second_id = second.id;

        let mut index = SpatialIndex::default();
        index.insert(&first);
        index.insert(&Region::Settlement(second));
        index.remove(&first);

        assert_eq!(index.settlement_at("overworld", chunk_key(0, 0)), Some(second_id));
        assert_eq!(index.claim_count(), 1);
    }
}
