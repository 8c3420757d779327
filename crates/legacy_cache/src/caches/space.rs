//! Caches for celestial bodies. Every body kind shares one generic cache;
//! planets add a lookup by the world on their surface.

use crate::cache::{CacheOptions, ReplicatedCache};
use crate::index::{IndexHandle, IndexKind};
use compact_str::CompactString;
use legacy_db::schema::{name_key, BlackHole, CelestialBody, CosmicBarrier, Planet, Star};
use legacy_db::{Database, Oid};
use std::ops::Deref;
use std::sync::Arc;

pub struct CelestialBodyCache<B: CelestialBody> {
    cache: ReplicatedCache<B>,
    by_name: IndexHandle<B, String>,
    by_space_world: IndexHandle<B, String>,
}

pub type StarCache = CelestialBodyCache<Star>;
pub type BlackHoleCache = CelestialBodyCache<BlackHole>;
pub type CosmicBarrierCache = CelestialBodyCache<CosmicBarrier>;

impl<B: CelestialBody> CelestialBodyCache<B> {
    pub fn new(db: &Database, name: impl Into<CompactString>, options: CacheOptions) -> Self {
        let cache = ReplicatedCache::with_options(db, name, options);
        let by_name = cache.add_index("name", IndexKind::Unique, |b: &B| name_key(b.name()));
        let by_space_world = cache.add_index("space_world", IndexKind::Hash, |b: &B| b.space_world().to_string());
        Self {
            cache,
            by_name,
            by_space_world,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<B>> {
        self.cache.query_first(&self.by_name, &name_key(name))
    }

    pub fn in_space_world(&self, world: &str) -> Vec<Arc<B>> {
        self.cache.query(&self.by_space_world, &world.to_string())
    }
}

impl<B: CelestialBody> Clone for CelestialBodyCache<B> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            by_name: self.by_name.clone(),
            by_space_world: self.by_space_world.clone(),
        }
    }
}

impl<B: CelestialBody> Deref for CelestialBodyCache<B> {
    type Target = ReplicatedCache<B>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

#[derive(Clone)]
pub struct PlanetCache {
    bodies: CelestialBodyCache<Planet>,
    by_planet_world: IndexHandle<Planet, String>,
    by_sun: IndexHandle<Planet, Oid<Star>>,
}

impl PlanetCache {
    pub fn new(db: &Database, options: CacheOptions) -> Self {
        let bodies = CelestialBodyCache::new(db, "PlanetCache", options);
        let by_planet_world = bodies.add_index("planet_world", IndexKind::Unique, |p: &Planet| name_key(&p.planet_world));
        let by_sun = bodies.add_multi_index("sun", IndexKind::Hash, |p: &Planet| p.sun_id);
        Self {
            bodies,
            by_planet_world,
            by_sun,
        }
    }

    /// The planet whose surface is the world `world`, ignoring case.
    pub fn get_by_planet_world(&self, world: &str) -> Option<Arc<Planet>> {
        self.bodies.query_first(&self.by_planet_world, &name_key(world))
    }

    pub fn orbiting(&self, star: Oid<Star>) -> Vec<Arc<Planet>> {
        self.bodies.query(&self.by_sun, &star)
    }
}

impl Deref for PlanetCache {
    type Target = CelestialBodyCache<Planet>;

    fn deref(&self) -> &Self::Target {
        &self.bodies
    }
}
