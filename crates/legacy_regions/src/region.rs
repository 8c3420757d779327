//! # Regions
//!
//! A region is a spatial claim derived from one cached entity. Each variant
//! keeps its own copy of the fields it needs for containment and access
//! checks, refreshed in place whenever its entity changes, so handles held
//! elsewhere stay valid for the region's whole life.
//!
//! ## Priority
//!
//! Settlement zones (priority 1) are more specific than settlements,
//! outposts and territories (priority 0). Overlapping regions are reported
//! highest priority first, then by ascending entity id.

use compact_str::CompactString;
use legacy_db::geometry::{distance_squared_xz, ChunkKey};
use legacy_db::schema::{
    ForeignRelation, Nation, NationOutpost, PlayerId, Settlement, SettlementZone, Territory, TrustLevel,
};
use legacy_db::{DbObject, Oid, Vec3i};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Shared, in-place updated region.
pub type RegionHandle = Arc<RwLock<Region>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Settlement,
    NationOutpost,
    Territory,
    SettlementZone,
}

impl RegionKind {
    pub fn priority(self) -> i32 {
        match self {
            RegionKind::SettlementZone => 1,
            RegionKind::Settlement | RegionKind::NationOutpost | RegionKind::Territory => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegionKind::Settlement => "settlement",
            RegionKind::NationOutpost => "outpost",
            RegionKind::Territory => "territory",
            RegionKind::SettlementZone => "zone",
        }
    }
}

/// Identity of a region: its kind plus the id of the entity it mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKey {
    Settlement(Oid<Settlement>),
    NationOutpost(Oid<NationOutpost>),
    Territory(Oid<Territory>),
    SettlementZone(Oid<SettlementZone>),
}

impl RegionKey {
    pub fn kind(&self) -> RegionKind {
        match self {
            RegionKey::Settlement(_) => RegionKind::Settlement,
            RegionKey::NationOutpost(_) => RegionKind::NationOutpost,
            RegionKey::Territory(_) => RegionKind::Territory,
            RegionKey::SettlementZone(_) => RegionKind::SettlementZone,
        }
    }

    pub fn raw(&self) -> Uuid {
        match self {
            RegionKey::Settlement(id) => id.raw(),
            RegionKey::NationOutpost(id) => id.raw(),
            RegionKey::Territory(id) => id.raw(),
            RegionKey::SettlementZone(id) => id.raw(),
        }
    }

    /// Sort key: higher priority first, then smaller id.
    pub(crate) fn precedence(&self) -> (std::cmp::Reverse<i32>, Uuid) {
        (std::cmp::Reverse(self.kind().priority()), self.raw())
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.raw())
    }
}

#[derive(Debug, Clone)]
pub struct SettlementRegion {
    pub id: Oid<Settlement>,
    pub name: String,
    pub world: CompactString,
    pub leader: PlayerId,
    pub nation: Option<Oid<Nation>>,
    pub chunks: HashSet<ChunkKey>,
    pub min_build_access: ForeignRelation,
    /// Zones nested in this settlement.
    pub children: BTreeSet<Oid<SettlementZone>>,
}

#[derive(Debug, Clone)]
pub struct OutpostRegion {
    pub id: Oid<NationOutpost>,
    pub name: String,
    pub world: CompactString,
    pub x: i32,
    pub z: i32,
    pub radius: i32,
    pub nation: Oid<Nation>,
    pub trust_level: TrustLevel,
    pub managers: BTreeSet<PlayerId>,
    pub trusted_players: BTreeSet<PlayerId>,
    pub trusted_nations: BTreeSet<Oid<Nation>>,
}

#[derive(Debug, Clone)]
pub struct TerritoryRegion {
    pub id: Oid<Territory>,
    pub name: String,
    pub world: CompactString,
    pub x: i32,
    pub z: i32,
    pub radius: i32,
    pub nation: Option<Oid<Nation>>,
}

#[derive(Debug, Clone)]
pub struct ZoneRegion {
    pub id: Oid<SettlementZone>,
    pub settlement: Oid<Settlement>,
    pub name: String,
    pub world: CompactString,
    pub min_point: Vec3i,
    pub max_point: Vec3i,
    pub price: Option<i64>,
    pub rent: Option<i64>,
    pub owner: Option<PlayerId>,
    pub trusted_players: Option<BTreeSet<PlayerId>>,
    pub trusted_nations: Option<BTreeSet<Oid<Nation>>>,
    pub trusted_settlements: Option<BTreeSet<Oid<Settlement>>>,
    pub min_build_access: Option<ForeignRelation>,
}

#[derive(Debug, Clone)]
pub enum Region {
    Settlement(SettlementRegion),
    NationOutpost(OutpostRegion),
    Territory(TerritoryRegion),
    SettlementZone(ZoneRegion),
}

impl Region {
    pub fn key(&self) -> RegionKey {
        match self {
            Region::Settlement(r) => RegionKey::Settlement(r.id),
            Region::NationOutpost(r) => RegionKey::NationOutpost(r.id),
            Region::Territory(r) => RegionKey::Territory(r.id),
            Region::SettlementZone(r) => RegionKey::SettlementZone(r.id),
        }
    }

    pub fn kind(&self) -> RegionKind {
        self.key().kind()
    }

    pub fn priority(&self) -> i32 {
        self.kind().priority()
    }

    pub fn name(&self) -> &str {
        match self {
            Region::Settlement(r) => &r.name,
            Region::NationOutpost(r) => &r.name,
            Region::Territory(r) => &r.name,
            Region::SettlementZone(r) => &r.name,
        }
    }

    pub fn world(&self) -> &str {
        match self {
            Region::Settlement(r) => &r.world,
            Region::NationOutpost(r) => &r.world,
            Region::Territory(r) => &r.world,
            Region::SettlementZone(r) => &r.world,
        }
    }

    /// Whether block `(x, y, z)` of this region's world lies inside it.
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        match self {
            Region::Settlement(r) => r.chunks.contains(&legacy_db::geometry::chunk_key_at(x, z)),
            Region::NationOutpost(r) => within_radius(r.x, r.z, r.radius, x, z),
            Region::Territory(r) => within_radius(r.x, r.z, r.radius, x, z),
            Region::SettlementZone(r) => {
                (r.min_point.x..=r.max_point.x).contains(&x)
                    && (r.min_point.y..=r.max_point.y).contains(&y)
                    && (r.min_point.z..=r.max_point.z).contains(&z)
            }
        }
    }

    /// Horizontal bounding box `(min, max)` of circular regions.
    pub(crate) fn circle_bounds(&self) -> Option<([i64; 2], [i64; 2])> {
        let (x, z, radius) = match self {
            Region::NationOutpost(r) => (r.x, r.z, r.radius),
            Region::Territory(r) => (r.x, r.z, r.radius),
            _ => return None,
        };
        let (x, z, radius) = (i64::from(x), i64::from(z), i64::from(radius));
        Some(([x - radius, z - radius], [x + radius, z + radius]))
    }

    pub fn as_settlement(&self) -> Option<&SettlementRegion> {
        match self {
            Region::Settlement(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_zone(&self) -> Option<&ZoneRegion> {
        match self {
            Region::SettlementZone(r) => Some(r),
            _ => None,
        }
    }
}

fn within_radius(cx: i32, cz: i32, radius: i32, x: i32, z: i32) -> bool {
    let radius = i64::from(radius);
    distance_squared_xz(cx, cz, x, z) <= radius * radius
}

/// An entity that defines a region.
pub trait Claim: DbObject {
    fn region_key(&self) -> RegionKey;

    fn to_region(&self) -> Region;

    /// Copies this snapshot's fields into `region`, keeping anything the
    /// region layer itself maintains (such as a settlement's child zones).
    fn refresh(&self, region: &mut Region);
}

impl Claim for Settlement {
    fn region_key(&self) -> RegionKey {
        RegionKey::Settlement(self.id)
    }

    fn to_region(&self) -> Region {
        Region::Settlement(SettlementRegion {
            id: self.id,
            name: self.name.clone(),
            world: self.world_name.as_str().into(),
            leader: self.leader_id,
            nation: self.nation_id,
            chunks: self.chunks.iter().copied().collect(),
            min_build_access: self.minimum_build_access,
            children: BTreeSet::new(),
        })
    }

    fn refresh(&self, region: &mut Region) {
        if let Region::Settlement(r) = region {
            r.name.clone_from(&self.name);
            r.world = self.world_name.as_str().into();
            r.leader = self.leader_id;
            r.nation = self.nation_id;
            r.chunks = self.chunks.iter().copied().collect();
            r.min_build_access = self.minimum_build_access;
        }
    }
}

impl Claim for NationOutpost {
    fn region_key(&self) -> RegionKey {
        RegionKey::NationOutpost(self.id)
    }

    fn to_region(&self) -> Region {
        Region::NationOutpost(OutpostRegion {
            id: self.id,
            name: self.name.clone(),
            world: self.world_name.as_str().into(),
            x: self.center_x,
            z: self.center_z,
            radius: self.radius,
            nation: self.nation_id,
            trust_level: self.trust_level,
            managers: self.manager_ids.clone(),
            trusted_players: self.trusted_player_ids.clone(),
            trusted_nations: self.trusted_nation_ids.clone(),
        })
    }

    fn refresh(&self, region: &mut Region) {
        if let Region::NationOutpost(r) = region {
            *r = match self.to_region() {
                Region::NationOutpost(fresh) => fresh,
                _ => return,
            };
        }
    }
}

impl Claim for Territory {
    fn region_key(&self) -> RegionKey {
        RegionKey::Territory(self.id)
    }

    fn to_region(&self) -> Region {
        Region::Territory(TerritoryRegion {
            id: self.id,
            name: self.name.clone(),
            world: self.world_name.as_str().into(),
            x: self.x,
            z: self.z,
            radius: self.radius,
            nation: self.nation_id,
        })
    }

    fn refresh(&self, region: &mut Region) {
        if let Region::Territory(r) = region {
            r.name.clone_from(&self.name);
            r.world = self.world_name.as_str().into();
            r.x = self.x;
            r.z = self.z;
            r.radius = self.radius;
            r.nation = self.nation_id;
        }
    }
}

impl Claim for SettlementZone {
    fn region_key(&self) -> RegionKey {
        RegionKey::SettlementZone(self.id)
    }

    fn to_region(&self) -> Region {
        Region::SettlementZone(ZoneRegion {
            id: self.id,
            settlement: self.settlement_id,
            name: self.name.clone(),
            world: self.world_name.as_str().into(),
            min_point: self.min_point,
            max_point: self.max_point,
            price: self.price,
            rent: self.rent,
            owner: self.owner,
            trusted_players: self.trusted_players.clone(),
            trusted_nations: self.trusted_nations.clone(),
            trusted_settlements: self.trusted_settlements.clone(),
            min_build_access: self.min_build_access,
        })
    }

    fn refresh(&self, region: &mut Region) {
        if let Region::SettlementZone(r) = region {
            if let Region::SettlementZone(fresh) = self.to_region() {
                *r = fresh;
            }
        }
    }
}
