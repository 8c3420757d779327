//! # Map Sync
//!
//! Pushes marker summaries of claims and celestial bodies to an external
//! map service behind [`MapBackend`]. Both syncs are driven by cache hooks
//! and, like region sync, only ever touch the backend from the tick queue.
//!
//! ## Marker sets
//!
//! - `nations`: one area per settlement, one circle per territory and one
//!   point per bastion.
//! - `space`: one point per star and planet, an orbit ring per planet, and a
//!   circle per black hole or cosmic barrier.

use compact_str::CompactString;
use legacy_cache::{CacheChange, Caches, FnHook, TickQueue};
use legacy_db::geometry::{distance_squared_xz, ChunkKey};
use legacy_db::schema::{
    BlackHole, CelestialBody, CosmicBarrier, Nation, Planet, Settlement, Star, Territory,
};
use legacy_db::Oid;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

pub const NATIONS_SET: &str = "nations";
pub const SPACE_SET: &str = "space";

const BLUE: u32 = 0x0000FF;
const WHITE: u32 = 0xFFFFFF;

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub fill_color: u32,
    pub fill_opacity: f32,
    pub line_color: u32,
    pub line_opacity: f32,
    pub line_weight: u32,
}

/// A filled shape made of claimed chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaMarker {
    pub id: String,
    pub label: String,
    pub world: CompactString,
    pub chunks: Vec<ChunkKey>,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleMarker {
    pub id: String,
    pub label: String,
    pub world: CompactString,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub radius: i32,
    pub style: Style,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointMarker {
    pub id: String,
    pub label: String,
    pub world: CompactString,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub icon: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    Area(AreaMarker),
    Circle(CircleMarker),
    Point(PointMarker),
}

impl Marker {
    pub fn id(&self) -> &str {
        match self {
            Marker::Area(m) => &m.id,
            Marker::Circle(m) => &m.id,
            Marker::Point(m) => &m.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Marker::Area(m) => &m.label,
            Marker::Circle(m) => &m.label,
            Marker::Point(m) => &m.label,
        }
    }
}

/// The external map service. Markers are addressed by set and id; putting a
/// marker with an existing id replaces it.
pub trait MapBackend: Send + Sync {
    fn put(&self, set: &str, marker: Marker);

    fn remove(&self, set: &str, id: &str);

    fn remove_prefixed(&self, set: &str, prefix: &str);

    fn clear(&self, set: &str);
}

/// Backend for servers without a map.
pub struct NoopMap;

impl MapBackend for NoopMap {
    fn put(&self, _set: &str, _marker: Marker) {}

    fn remove(&self, _set: &str, _id: &str) {}

    fn remove_prefixed(&self, _set: &str, _prefix: &str) {}

    fn clear(&self, _set: &str) {}
}

/// In-process marker store.
#[derive(Default)]
pub struct MemoryMap {
    sets: Mutex<BTreeMap<String, BTreeMap<String, Marker>>>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self, set: &str, id: &str) -> Option<Marker> {
        self.sets.lock().get(set).and_then(|markers| markers.get(id)).cloned()
    }

    /// Marker ids in `set`, sorted.
    pub fn ids(&self, set: &str) -> Vec<String> {
        self.sets
            .lock()
            .get(set)
            .map(|markers| markers.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, set: &str) -> usize {
        self.sets.lock().get(set).map_or(0, BTreeMap::len)
    }
}

impl MapBackend for MemoryMap {
    fn put(&self, set: &str, marker: Marker) {
        self.sets
            .lock()
            .entry(set.to_string())
            .or_default()
            .insert(marker.id().to_string(), marker);
    }

    fn remove(&self, set: &str, id: &str) {
        if let Some(markers) = self.sets.lock().get_mut(set) {
            markers.remove(id);
        }
    }

    fn remove_prefixed(&self, set: &str, prefix: &str) {
        if let Some(markers) = self.sets.lock().get_mut(set) {
            markers.retain(|id, _| !id.starts_with(prefix));
        }
    }

    fn clear(&self, set: &str) {
        self.sets.lock().remove(set);
    }
}

fn settlement_marker_id(id: Oid<Settlement>) -> String {
    format!("settlement-{}", id)
}

fn territory_marker_id(id: Oid<Territory>) -> String {
    format!("territory-{}", id)
}

fn bastion_prefix(id: Oid<Territory>) -> String {
    format!("bastion-{}", id)
}

/// Settlement and territory markers.
pub struct NationsMap {
    caches: Caches,
    backend: Arc<dyn MapBackend>,
    tick: TickQueue,
}

impl NationsMap {
    pub fn new(caches: Caches, backend: Arc<dyn MapBackend>, tick: TickQueue) -> Arc<Self> {
        Arc::new(Self { caches, backend, tick })
    }

    /// Rebuilds the whole set from the caches.
    pub fn refresh(&self) {
        self.backend.clear(NATIONS_SET);
        let settlements = self.caches.settlements.all();
        let territories = self.caches.territories.all();
        for settlement in &settlements {
            self.add_settlement(settlement);
        }
        for territory in &territories {
            self.add_territory(territory);
        }
        info!(
            "🗺️ Nations map refreshed: {} settlements, {} territories",
            settlements.len(),
            territories.len()
        );
    }

    pub fn add_settlement(&self, settlement: &Settlement) {
        let mut label = settlement.name.clone();
        let mut color = BLUE;
        if let Some(nation) = settlement.nation_id.and_then(|id| self.caches.nations.try_get(id)) {
            color = nation.color;
            label.push_str(&format!(" ({})", nation.name));
        }

        self.backend.put(
            NATIONS_SET,
            Marker::Area(AreaMarker {
                id: settlement_marker_id(settlement.id),
                label,
                world: settlement.world_name.as_str().into(),
                chunks: settlement.chunks.iter().copied().collect(),
                style: Style {
                    fill_color: color,
                    fill_opacity: 0.2,
                    line_color: color,
                    line_opacity: 0.5,
                    line_weight: 3,
                },
            }),
        );
    }

    pub fn remove_settlement(&self, id: Oid<Settlement>) {
        self.backend.remove(NATIONS_SET, &settlement_marker_id(id));
    }

    pub fn add_territory(&self, territory: &Territory) {
        let nation = territory.nation_id.and_then(|id| self.caches.nations.try_get(id));
        let owner = nation.as_ref().map_or("no nation", |n| n.name.as_str());
        let schedule = &territory.siege_schedule;

        self.backend.put(
            NATIONS_SET,
            Marker::Circle(CircleMarker {
                id: territory_marker_id(territory.id),
                label: territory.name.clone(),
                world: territory.world_name.as_str().into(),
                x: territory.x,
                y: 128,
                z: territory.z,
                radius: territory.radius,
                style: Style {
                    fill_color: WHITE,
                    fill_opacity: 0.0,
                    line_color: nation.as_ref().map_or(WHITE, |n| n.color),
                    line_opacity: 0.8,
                    line_weight: 5,
                },
                description: Some(format!(
                    "{}\nOwned by {}\nSiege time: {} on {:?}",
                    territory.name,
                    owner,
                    schedule.period.text(),
                    schedule.day_of_week
                )),
            }),
        );
        self.sync_bastions(territory);
    }

    fn sync_bastions(&self, territory: &Territory) {
        self.backend
            .remove_prefixed(NATIONS_SET, &bastion_prefix(territory.id));

        for bastion in &territory.bastions {
            let occupier = bastion
                .occupier_id
                .and_then(|id| self.caches.nations.try_get(id))
                .map(|n| n.name.clone())
                .unwrap_or_else(|| "Not claimed".to_string());
            let icon = if bastion.occupier_id == territory.nation_id {
                "bricks"
            } else {
                "pirateflag"
            };
            self.backend.put(
                NATIONS_SET,
                Marker::Point(PointMarker {
                    id: format!("{}-{}", bastion_prefix(territory.id), bastion.name),
                    label: format!("{} ({})", bastion.name, occupier),
                    world: territory.world_name.as_str().into(),
                    x: bastion.x,
                    y: bastion.y,
                    z: bastion.z,
                    icon,
                }),
            );
        }
    }

    pub fn remove_territory(&self, id: Oid<Territory>) {
        self.backend.remove(NATIONS_SET, &territory_marker_id(id));
        self.backend.remove_prefixed(NATIONS_SET, &bastion_prefix(id));
    }

    /// Redraws every marker whose colors or labels come from a nation.
    pub fn update_owners(&self) {
        for settlement in self.caches.settlements.all() {
            self.add_settlement(&settlement);
        }
        for territory in self.caches.territories.all() {
            self.add_territory(&territory);
        }
    }

    /// Follows settlement, territory and nation changes.
    pub fn install(self: &Arc<Self>) {
        let (map, tick) = (Arc::downgrade(self), self.tick.clone());
        self.caches.settlements.add_hook(Arc::new(FnHook::new(
            "map:settlement",
            move |change: &CacheChange<Settlement>| -> anyhow::Result<()> {
                let change = change.clone();
                post(&tick, &map, move |map| match change {
                    CacheChange::Deleted(settlement) => map.remove_settlement(settlement.id),
                    other => map.add_settlement(other.entity()),
                });
                Ok(())
            },
        )));

        let (map, tick) = (Arc::downgrade(self), self.tick.clone());
        self.caches.territories.add_hook(Arc::new(FnHook::new(
            "map:territory",
            move |change: &CacheChange<Territory>| -> anyhow::Result<()> {
                let change = change.clone();
                post(&tick, &map, move |map| match change {
                    CacheChange::Deleted(territory) => map.remove_territory(territory.id),
                    other => map.add_territory(other.entity()),
                });
                Ok(())
            },
        )));

        let (map, tick) = (Arc::downgrade(self), self.tick.clone());
        self.caches.nations.add_hook(Arc::new(FnHook::new(
            "map:nation",
            move |_change: &CacheChange<Nation>| -> anyhow::Result<()> {
                post(&tick, &map, |map| map.update_owners());
                Ok(())
            },
        )));
    }
}

fn post<M: Send + Sync + 'static>(tick: &TickQueue, map: &Weak<M>, task: impl FnOnce(&M) + Send + 'static) {
    let map = map.clone();
    tick.post(move || {
        if let Some(map) = map.upgrade() {
            task(&map);
        }
    });
}

/// Star, planet, black hole and barrier markers.
pub struct SpaceMap {
    caches: Caches,
    backend: Arc<dyn MapBackend>,
    tick: TickQueue,
    refresh_queued: AtomicBool,
}

impl SpaceMap {
    pub fn new(caches: Caches, backend: Arc<dyn MapBackend>, tick: TickQueue) -> Arc<Self> {
        Arc::new(Self {
            caches,
            backend,
            tick,
            refresh_queued: AtomicBool::new(false),
        })
    }

    pub fn refresh(&self) {
        self.refresh_queued.store(false, Ordering::Release);
        self.backend.clear(SPACE_SET);

        for star in self.caches.stars.all() {
            self.backend.put(SPACE_SET, body_point(&*star, "sun"));
        }

        for planet in self.caches.planets.all() {
            self.backend.put(SPACE_SET, body_point(&*planet, "world"));
            let Some(star) = planet.sun_id.and_then(|id| self.caches.stars.try_get(id)) else {
                continue;
            };
            let orbit = (distance_squared_xz(star.x, star.z, planet.x, planet.z) as f64).sqrt() as i32;
            let color = orbit_color(&planet.name);
            self.backend.put(
                SPACE_SET,
                Marker::Circle(CircleMarker {
                    id: format!("{}_orbit", planet.id),
                    label: planet.name.clone(),
                    world: planet.space_world.as_str().into(),
                    x: star.x,
                    y: star.y,
                    z: star.z,
                    radius: orbit,
                    style: Style {
                        fill_color: 0,
                        fill_opacity: 0.0,
                        line_color: color,
                        line_opacity: 0.8,
                        line_weight: 3,
                    },
                    description: None,
                }),
            );
        }

        for hole in self.caches.black_holes.all() {
            self.backend.put(SPACE_SET, body_circle(&*hole, hole.radius, 0x000000));
        }
        for barrier in self.caches.cosmic_barriers.all() {
            self.backend.put(SPACE_SET, body_circle(&*barrier, barrier.radius, 0xFF0000));
        }
        debug!("Space map refreshed ({} markers)", self.caches.stars.len() + self.caches.planets.len());
    }

    /// Queues one refresh on the tick thread, however many changes arrive
    /// before it runs.
    pub fn request_refresh(self: &Arc<Self>) {
        if self.refresh_queued.swap(true, Ordering::AcqRel) {
            return;
        }
        post(&self.tick, &Arc::downgrade(self), |map: &SpaceMap| map.refresh());
    }

    pub fn install(self: &Arc<Self>) {
        let caches = &self.caches;
        caches.stars.add_hook(self.refresh_hook::<Star>("space:star"));
        caches.planets.add_hook(self.refresh_hook::<Planet>("space:planet"));
        caches.black_holes.add_hook(self.refresh_hook::<BlackHole>("space:black_hole"));
        caches
            .cosmic_barriers
            .add_hook(self.refresh_hook::<CosmicBarrier>("space:cosmic_barrier"));
    }

    fn refresh_hook<B: CelestialBody>(self: &Arc<Self>, name: &str) -> Arc<dyn legacy_cache::CacheHook<B>> {
        let map = Arc::downgrade(self);
        Arc::new(FnHook::new(name, move |_change: &CacheChange<B>| -> anyhow::Result<()> {
            if let Some(map) = map.upgrade() {
                map.request_refresh();
            }
            Ok(())
        }))
    }
}

fn body_point<B: CelestialBody>(body: &B, icon: &'static str) -> Marker {
    let at = body.position();
    Marker::Point(PointMarker {
        id: body.id().to_string(),
        label: body.name().to_string(),
        world: body.space_world().into(),
        x: at.x,
        y: at.y,
        z: at.z,
        icon,
    })
}

fn body_circle<B: CelestialBody>(body: &B, radius: i32, color: u32) -> Marker {
    let at = body.position();
    Marker::Circle(CircleMarker {
        id: body.id().to_string(),
        label: body.name().to_string(),
        world: body.space_world().into(),
        x: at.x,
        y: at.y,
        z: at.z,
        radius,
        style: Style {
            fill_color: color,
            fill_opacity: 0.3,
            line_color: color,
            line_opacity: 0.8,
            line_weight: 2,
        },
        description: None,
    })
}

/// Stable purple-ish ring color derived from the planet name.
fn orbit_color(name: &str) -> u32 {
    let hash = name
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3));
    let r = 128 + (hash & 0x7F) as u32;
    let g = 1 + ((hash >> 8) % 19) as u32;
    let b = 128 + ((hash >> 16) & 0x7F) as u32;
    (r << 16) | (g << 8) | b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_map_prefix_removal_is_scoped_to_the_set() {
        let map = MemoryMap::new();
        let point = |id: &str| {
            Marker::Point(PointMarker {
                id: id.to_string(),
                label: id.to_string(),
                world: "space".into(),
                x: 0,
                y: 0,
                z: 0,
                icon: "sun",
            })
        };
        map.put(NATIONS_SET, point("bastion-a-1"));
        map.put(NATIONS_SET, point("bastion-a-2"));
        map.put(NATIONS_SET, point("bastion-b-1"));
        map.put(SPACE_SET, point("bastion-a-3"));

        map.remove_prefixed(NATIONS_SET, "bastion-a");
        assert_eq!(map.ids(NATIONS_SET), vec!["bastion-b-1".to_string()]);
        assert_eq!(map.len(SPACE_SET), 1);
    }

    #[test]
    fn orbit_colors_are_stable_and_in_range() {
        let color = orbit_color("Aerach");
        assert_eq!(color, orbit_color("Aerach"));
        let (r, g, b) = (color >> 16, (color >> 8) & 0xFF, color & 0xFF);
        assert!((128..=255).contains(&r));
        assert!((1..20).contains(&g));
        assert!((128..=255).contains(&b));
    }
}
