//! # Specialized Caches
//!
//! One cache per persisted entity type, each declaring the indexes its
//! callers need and exposing typed lookups over them. [`Caches`] owns one
//! instance of each and is the only place they are constructed.

mod economy;
mod nation;
mod outpost;
mod player;
mod relation;
mod role;
mod settlement;
mod space;
mod territory;
mod zone;

pub use economy::EcoStationCache;
pub use nation::NationCache;
pub use outpost::NationOutpostCache;
pub use player::PlayerCache;
pub use relation::RelationCache;
pub use role::SettlementRoleCache;
pub use settlement::SettlementCache;
pub use space::{BlackHoleCache, CelestialBodyCache, CosmicBarrierCache, PlanetCache, StarCache};
pub use territory::TerritoryCache;
pub use zone::SettlementZoneCache;

use crate::cache::CacheOptions;
use crate::error::CacheError;
use crate::stats::CacheStats;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use legacy_db::Database;
use std::time::Instant;
use tracing::info;

/// Composition root for every replicated cache.
#[derive(Clone)]
pub struct Caches {
    pub players: PlayerCache,
    pub nations: NationCache,
    pub settlements: SettlementCache,
    pub zones: SettlementZoneCache,
    pub roles: SettlementRoleCache,
    pub outposts: NationOutpostCache,
    pub territories: TerritoryCache,
    pub relations: RelationCache,
    pub eco_stations: EcoStationCache,
    pub stars: StarCache,
    pub planets: PlanetCache,
    pub black_holes: BlackHoleCache,
    pub cosmic_barriers: CosmicBarrierCache,
}

impl Caches {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        Self {
            players: PlayerCache::new(db, options),
            nations: NationCache::new(db, options),
            settlements: SettlementCache::new(db, options),
            zones: SettlementZoneCache::new(db, options),
            roles: SettlementRoleCache::new(db, options),
            outposts: NationOutpostCache::new(db, options),
            territories: TerritoryCache::new(db, options),
            relations: RelationCache::new(db, options),
            eco_stations: EcoStationCache::new(db, options),
            stars: StarCache::new(db, "StarCache", options),
            planets: PlanetCache::new(db, options),
            black_holes: BlackHoleCache::new(db, "BlackHoleCache", options),
            cosmic_barriers: CosmicBarrierCache::new(db, "CosmicBarrierCache", options),
        }
    }

    /// Loads every cache. Caches another cache's readers resolve references
    /// into (players, settlements, nations, stars) load first; the rest load
    /// concurrently afterwards. Returns the total number of entities loaded.
    pub async fn load_all(&self) -> Result<usize, CacheError> {
        let started = Instant::now();

        let roots: Vec<BoxFuture<'_, Result<usize, CacheError>>> = vec![
            self.players.load().boxed(),
            self.settlements.load().boxed(),
            self.nations.load().boxed(),
            self.stars.load().boxed(),
        ];
        let dependents: Vec<BoxFuture<'_, Result<usize, CacheError>>> = vec![
            self.zones.load().boxed(),
            self.roles.load().boxed(),
            self.outposts.load().boxed(),
            self.territories.load().boxed(),
            self.relations.load().boxed(),
            self.eco_stations.load().boxed(),
            self.planets.load().boxed(),
            self.black_holes.load().boxed(),
            self.cosmic_barriers.load().boxed(),
        ];

        let mut total: usize = try_join_all(roots).await?.into_iter().sum();
        total += try_join_all(dependents).await?.into_iter().sum::<usize>();

        info!("✅ Loaded {} cached entities in {:?}", total, started.elapsed());
        Ok(total)
    }

    /// Stops every feed consumer.
    pub async fn shutdown(&self) {
        futures::join!(
            self.players.shutdown(),
            self.settlements.shutdown(),
            self.nations.shutdown(),
            self.stars.shutdown(),
            self.zones.shutdown(),
            self.roles.shutdown(),
            self.outposts.shutdown(),
            self.territories.shutdown(),
            self.relations.shutdown(),
            self.eco_stations.shutdown(),
            self.planets.shutdown(),
            self.black_holes.shutdown(),
            self.cosmic_barriers.shutdown(),
        );
        info!("🛑 Cache feeds stopped");
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        vec![
            self.players.stats(),
            self.settlements.stats(),
            self.nations.stats(),
            self.stars.stats(),
            self.zones.stats(),
            self.roles.stats(),
            self.outposts.stats(),
            self.territories.stats(),
            self.relations.stats(),
            self.eco_stations.stats(),
            self.planets.stats(),
            self.black_holes.stats(),
            self.cosmic_barriers.stats(),
        ]
    }
}
