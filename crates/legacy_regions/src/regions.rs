//! # Region Manager
//!
//! [`Regions`] owns every region and the structures that find them by
//! position. It is built once from the caches' contents and then kept current
//! by the hooks in [`crate::sync`], which replay cache changes on the tick
//! thread.
//!
//! ## Locking
//!
//! One `RwLock` guards the region map and the spatial index; each region has
//! its own lock for in-place refreshes. Region locks are only taken while the
//! manager lock is held, so callers must not hold a region guard while
//! calling back into [`Regions`].

use crate::cooldown::FailedAccessCooldown;
use crate::error::RegionError;
use crate::region::{Claim, Region, RegionHandle, RegionKey, RegionKind};
use crate::spatial::SpatialIndex;
use legacy_cache::{CacheError, Caches};
use legacy_db::schema::{PlayerId, Settlement, SettlementZone};
use legacy_db::{Location, Oid};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default window during which repeated failed access by the same player in
/// the same region produces no further feedback.
pub const DEFAULT_FAILED_ACCESS_COOLDOWN: Duration = Duration::from_secs(5);

pub struct Regions {
    caches: Caches,
    state: RwLock<RegionState>,
    cooldown: FailedAccessCooldown,
}

#[derive(Default)]
struct RegionState {
    regions: HashMap<RegionKey, RegionHandle>,
    spatial: SpatialIndex,
    /// Zones whose settlement has no region (yet).
    orphans: HashMap<Oid<Settlement>, BTreeSet<Oid<SettlementZone>>>,
}

impl RegionState {
    fn attach(&mut self, zone: Oid<SettlementZone>, settlement: Oid<Settlement>) {
        let parent = self.regions.get(&RegionKey::Settlement(settlement));
        match parent {
            Some(parent) => {
                if let Region::Settlement(parent) = &mut *parent.write() {
                    parent.children.insert(zone);
                }
            }
            None => {
                let err = RegionError::MissingParent {
                    zone: zone.to_string(),
                    settlement: settlement.to_string(),
                };
                warn!("⚠️ {}", err);
                self.orphans.entry(settlement).or_default().insert(zone);
            }
        }
    }

    fn detach(&mut self, zone: Oid<SettlementZone>, settlement: Oid<Settlement>) {
        if let Some(parent) = self.regions.get(&RegionKey::Settlement(settlement)) {
            if let Region::Settlement(parent) = &mut *parent.write() {
                parent.children.remove(&zone);
            }
        }
        if let Some(waiting) = self.orphans.get_mut(&settlement) {
            waiting.remove(&zone);
            if waiting.is_empty() {
                self.orphans.remove(&settlement);
            }
        }
    }
}

impl Regions {
    pub fn new(caches: Caches, failed_access_cooldown: Duration) -> Self {
        Self {
            caches,
            state: RwLock::new(RegionState::default()),
            cooldown: FailedAccessCooldown::new(failed_access_cooldown),
        }
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Builds regions from the current cache contents. Settlements go first
    /// so zones find their parents. Returns the number of regions.
    pub fn load(&self) -> Result<usize, RegionError> {
        let caches = &self.caches;
        for (name, loaded) in [
            (caches.settlements.name(), caches.settlements.is_loaded()),
            (caches.outposts.name(), caches.outposts.is_loaded()),
            (caches.territories.name(), caches.territories.is_loaded()),
            (caches.zones.name(), caches.zones.is_loaded()),
        ] {
            if !loaded {
                return Err(CacheError::NotLoaded(name.to_string()).into());
            }
        }

        for settlement in caches.settlements.all() {
            self.upsert(&*settlement);
        }
        for outpost in caches.outposts.all() {
            self.upsert(&*outpost);
        }
        for territory in caches.territories.all() {
            self.upsert(&*territory);
        }
        for zone in caches.zones.all() {
            self.upsert(&*zone);
        }

        let count = self.len();
        info!("🗺️ Loaded {} regions", count);
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.state.read().regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: RegionKey) -> Result<RegionHandle, RegionError> {
        self.try_get(key)
            .ok_or_else(|| RegionError::UnknownRegion(key.to_string()))
    }

    pub fn try_get(&self, key: RegionKey) -> Option<RegionHandle> {
        self.state.read().regions.get(&key).cloned()
    }

    /// Every region containing `location`, most specific first.
    pub fn find(&self, location: &Location) -> Vec<RegionHandle> {
        let (x, y, z) = (location.x, location.y, location.z);
        let state = self.state.read();
        let mut found: Vec<(RegionKey, RegionHandle)> = Vec::new();

        if let Some(settlement) = state.spatial.settlement_at(&location.world, location.chunk_key()) {
            let key = RegionKey::Settlement(settlement);
            if let Some(handle) = state.regions.get(&key) {
                let children: Vec<Oid<SettlementZone>> = handle
                    .read()
                    .as_settlement()
                    .map(|s| s.children.iter().copied().collect())
                    .unwrap_or_default();
                found.push((key, handle.clone()));

                for zone in children {
                    let key = RegionKey::SettlementZone(zone);
                    if let Some(child) = state.regions.get(&key) {
                        if child.read().contains(x, y, z) {
                            found.push((key, child.clone()));
                        }
                    }
                }
            }
        }

        for key in state.spatial.circles_at(&location.world, x, z) {
            if let Some(handle) = state.regions.get(&key) {
                if handle.read().contains(x, y, z) {
                    found.push((key, handle.clone()));
                }
            }
        }

        found.sort_by_key(|(key, _)| key.precedence());
        found.into_iter().map(|(_, handle)| handle).collect()
    }

    /// The most specific region of `kind` containing `location`.
    pub fn find_first_of(&self, location: &Location, kind: RegionKind) -> Option<RegionHandle> {
        self.find(location)
            .into_iter()
            .find(|handle| handle.read().kind() == kind)
    }

    /// Zone regions nested in `settlement`.
    pub fn children(&self, settlement: Oid<Settlement>) -> Vec<RegionHandle> {
        let state = self.state.read();
        let Some(parent) = state.regions.get(&RegionKey::Settlement(settlement)) else {
            return Vec::new();
        };
        let children: Vec<Oid<SettlementZone>> = parent
            .read()
            .as_settlement()
            .map(|s| s.children.iter().copied().collect())
            .unwrap_or_default();
        children
            .into_iter()
            .filter_map(|zone| state.regions.get(&RegionKey::SettlementZone(zone)).cloned())
            .collect()
    }

    // ---- access ----

    pub fn calculate_inaccess_message(&self, actor: PlayerId, region: &Region) -> Option<String> {
        region.inaccess_message(&self.caches, actor)
    }

    pub fn can_access(&self, actor: PlayerId, region: &Region) -> bool {
        self.calculate_inaccess_message(actor, region).is_none()
    }

    /// Access at a position is decided by the most specific region there.
    /// Unclaimed positions are open to everyone.
    pub fn inaccess_message_at(&self, actor: PlayerId, location: &Location) -> Option<String> {
        let governing = self.find(location).into_iter().next()?;
        let message = governing.read().inaccess_message(&self.caches, actor);
        message
    }

    /// Records that `actor` was refused in `region`. Returns whether they
    /// should be told, which is rate limited per region and player.
    pub fn on_failed_access(&self, actor: PlayerId, region: RegionKey) -> bool {
        self.cooldown.try_trigger(region, actor, Instant::now())
    }

    // ---- maintenance ----

    /// Registers `entity`'s region, or refreshes it in place if it exists.
    pub fn upsert<E: Claim>(&self, entity: &E) {
        let key = entity.region_key();
        let mut state = self.state.write();

        let Some(handle) = state.regions.get(&key).cloned() else {
            let mut region = entity.to_region();
            if let Region::Settlement(settlement) = &mut region {
                settlement.children = state.orphans.remove(&settlement.id).unwrap_or_default();
            }
            state.spatial.insert(&region);
            if let Region::SettlementZone(zone) = &region {
                state.attach(zone.id, zone.settlement);
            }
            state.regions.insert(key, Arc::new(RwLock::new(region)));
            debug!(region = %key, "region added");
            return;
        };

        let mut region = handle.write();
        let previous_parent = region.as_zone().map(|zone| zone.settlement);
        state.spatial.remove(&region);
        entity.refresh(&mut region);
        state.spatial.insert(&region);

        if let (Some(previous), Some(zone)) = (previous_parent, region.as_zone()) {
            if zone.settlement != previous {
                let (id, next) = (zone.id, zone.settlement);
                drop(region);
                state.detach(id, previous);
                state.attach(id, next);
            }
        }
        debug!(region = %key, "region refreshed");
    }

    /// Removes `entity`'s region and forgets state keyed on it.
    pub fn remove<E: Claim>(&self, entity: &E) {
        let key = entity.region_key();
        {
            let mut state = self.state.write();
            let Some(handle) = state.regions.remove(&key) else {
                debug!(region = %key, "no region to remove");
                return;
            };
            let region = handle.read();
            state.spatial.remove(&region);
            match &*region {
                Region::SettlementZone(zone) => state.detach(zone.id, zone.settlement),
                Region::Settlement(settlement) if !settlement.children.is_empty() => {
                    state
                        .orphans
                        .entry(settlement.id)
                        .or_default()
                        .extend(settlement.children.iter().copied());
                }
                _ => {}
            }
        }
        self.cooldown.invalidate(key);
        debug!(region = %key, "region removed");
    }

    pub fn cooldown_entries(&self) -> usize {
        self.cooldown.len()
    }
}
