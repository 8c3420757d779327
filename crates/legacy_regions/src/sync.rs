//! Cache hooks that keep [`Regions`] in step with the caches.
//!
//! Hooks run on feed consumers, so every region mutation is posted to the
//! [`TickQueue`] and applied the next time the tick loop drains it. Hooks hold
//! the manager weakly; work posted after the manager is dropped is skipped.

use crate::region::Claim;
use crate::regions::Regions;
use legacy_cache::{CacheHook, TickQueue};
use legacy_db::schema::{NationOutpost, Settlement, SettlementZone, Territory};
use legacy_db::DbObject;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tracing::trace;

pub struct RegionSync<E> {
    name: String,
    regions: Weak<Regions>,
    tick: TickQueue,
    _claim: PhantomData<fn() -> E>,
}

impl<E: Claim> RegionSync<E> {
    pub fn new(regions: &Arc<Regions>, tick: &TickQueue) -> Self {
        Self {
            name: format!("regions:{}", E::COLLECTION),
            regions: Arc::downgrade(regions),
            tick: tick.clone(),
            _claim: PhantomData,
        }
    }

    fn post(&self, entity: Arc<E>, removed: bool) {
        let regions = self.regions.clone();
        self.tick.post(move || {
            let Some(regions) = regions.upgrade() else {
                trace!("region manager gone, dropping {}", entity.id());
                return;
            };
            if removed {
                regions.remove(&*entity);
            } else {
                regions.upsert(&*entity);
            }
        });
    }
}

impl<E: Claim> CacheHook<E> for RegionSync<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_insert(&self, entity: &Arc<E>) -> anyhow::Result<()> {
        self.post(entity.clone(), false);
        Ok(())
    }

    fn on_update(&self, _old: &Arc<E>, new: &Arc<E>) -> anyhow::Result<()> {
        self.post(new.clone(), false);
        Ok(())
    }

    fn on_delete(&self, entity: &Arc<E>) -> anyhow::Result<()> {
        self.post(entity.clone(), true);
        Ok(())
    }
}

/// Registers region hooks on every cache that defines regions.
pub fn install(regions: &Arc<Regions>, tick: &TickQueue) {
    let caches = regions.caches();
    caches
        .settlements
        .add_hook(Arc::new(RegionSync::<Settlement>::new(regions, tick)));
    caches
        .outposts
        .add_hook(Arc::new(RegionSync::<NationOutpost>::new(regions, tick)));
    caches
        .territories
        .add_hook(Arc::new(RegionSync::<Territory>::new(regions, tick)));
    caches
        .zones
        .add_hook(Arc::new(RegionSync::<SettlementZone>::new(regions, tick)));
}
