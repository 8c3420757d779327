//! Composition root for the world state.
//!
//! [`LegacyServer`] owns the store, the replicated caches, the region layer,
//! map sync and the command surface, and wires the hooks between them. It
//! also runs the tick loop that drains the [`TickQueue`], which is the only
//! place regions and map markers are ever modified.

use crate::commands::NationCommands;
use crate::config::AppConfig;
use crate::shutdown::ShutdownState;
use legacy_cache::{CacheError, Caches, TickQueue};
use legacy_db::{Database, MemoryStore, StoreClient};
use legacy_regions::map::{NATIONS_SET, SPACE_SET};
use legacy_regions::{MapBackend, MemoryMap, NationsMap, NoopMap, RegionError, Regions, SpaceMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::interval;
use tracing::{error, info, trace, warn};

/// Upper bound on tick queue drains during shutdown.
const MAX_DRAIN_ROUNDS: usize = 64;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cache startup failed: {0}")]
    Cache(#[from] CacheError),

    #[error("region startup failed: {0}")]
    Regions(#[from] RegionError),
}

pub struct LegacyServer {
    store: Arc<MemoryStore>,
    db: Database,
    caches: Caches,
    tick: TickQueue,
    regions: Arc<Regions>,
    markers: Option<Arc<MemoryMap>>,
    nations_map: Arc<NationsMap>,
    space_map: Arc<SpaceMap>,
    commands: NationCommands,
    tick_interval: Duration,
    load_on_startup: bool,
}

impl LegacyServer {
    /// Builds every component and installs the cache hooks. Nothing is loaded
    /// yet. Must be called from within a tokio runtime.
    pub fn new(config: &AppConfig) -> Self {
        let store = Arc::new(MemoryStore::with_feed_capacity(
            config.store.database.as_str(),
            config.store.feed_capacity,
        ));
        let client: Arc<dyn StoreClient> = store.clone();
        let db = Database::new(client);
        let caches = Caches::new(&db, config.cache_options());
        let tick = TickQueue::new();

        let regions = Arc::new(Regions::new(caches.clone(), config.failed_access_cooldown()));
        legacy_regions::sync::install(&regions, &tick);

        let markers = config.map.enabled.then(|| Arc::new(MemoryMap::new()));
        let map: Arc<dyn MapBackend> = match &markers {
            Some(markers) => markers.clone(),
            None => Arc::new(NoopMap),
        };
        let nations_map = NationsMap::new(caches.clone(), map.clone(), tick.clone());
        nations_map.install();
        let space_map = SpaceMap::new(caches.clone(), map.clone(), tick.clone());
        space_map.install();

        let commands = NationCommands::new(db.clone(), caches.clone());

        Self {
            store,
            db,
            caches,
            tick,
            regions,
            markers,
            nations_map,
            space_map,
            commands,
            tick_interval: config.tick_interval(),
            load_on_startup: config.cache.load_on_startup,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub fn tick_queue(&self) -> &TickQueue {
        &self.tick
    }

    pub fn regions(&self) -> &Arc<Regions> {
        &self.regions
    }

    /// The marker store, when map sync is enabled.
    pub fn markers(&self) -> Option<&Arc<MemoryMap>> {
        self.markers.as_ref()
    }

    pub fn commands(&self) -> &NationCommands {
        &self.commands
    }

    /// Loads the caches and derives regions and map markers from them.
    ///
    /// With `load_on_startup` disabled this returns immediately and the load
    /// continues in the background; regions and markers are then built on
    /// the tick loop once the caches are ready.
    pub async fn start(&self) -> Result<(), ServerError> {
        if !self.load_on_startup {
            info!("⏳ Loading caches in the background");
            let caches = self.caches.clone();
            let tick = self.tick.clone();
            let regions = self.regions.clone();
            let nations_map = self.nations_map.clone();
            let space_map = self.space_map.clone();
            tokio::spawn(async move {
                if let Err(e) = caches.load_all().await {
                    error!("❌ Background cache load failed: {}", e);
                    return;
                }
                tick.post(move || {
                    if let Err(e) = regions.load() {
                        error!("❌ Failed to build regions: {}", e);
                    }
                    nations_map.refresh();
                    space_map.refresh();
                });
            });
            return Ok(());
        }

        let started = Instant::now();
        let entities = self.caches.load_all().await?;
        let regions = self.regions.load()?;
        self.nations_map.refresh();
        self.space_map.refresh();
        info!(
            "✅ World state ready: {} entities, {} regions in {:?}",
            entities,
            regions,
            started.elapsed()
        );
        Ok(())
    }

    /// Drains the tick queue every tick until shutdown is initiated.
    pub async fn run_tick_loop(&self, shutdown_state: ShutdownState) {
        let mut ticker = interval(self.tick_interval);
        let mut tick_count: u64 = 0;
        info!("🕒 Server tick started with interval: {}ms", self.tick_interval.as_millis());

        loop {
            if shutdown_state.is_shutdown_initiated() {
                info!("🕒 Server tick stopping - shutdown initiated");
                break;
            }

            ticker.tick().await;

            // shutdown may have started while waiting for the tick
            if shutdown_state.is_shutdown_initiated() {
                info!("🕒 Server tick stopping - shutdown initiated during tick wait");
                break;
            }

            tick_count += 1;
            let ran = self.tick.run_pending();
            if ran > 0 {
                trace!("Tick {} ran {} task(s)", tick_count, ran);
            }
        }

        info!("✅ Server tick loop completed gracefully after {} ticks", tick_count);
    }

    /// Stops commands and feeds, runs what is left on the tick queue and
    /// closes the store.
    pub async fn shutdown(&self) {
        self.commands.shutdown().await;
        self.caches.shutdown().await;

        let mut rounds = 0;
        while self.tick.pending() > 0 && rounds < MAX_DRAIN_ROUNDS {
            self.tick.run_pending();
            rounds += 1;
        }
        if self.tick.pending() > 0 {
            warn!("⚠️ {} tick task(s) left unrun at shutdown", self.tick.pending());
        }

        self.store.shutdown();
        self.log_final_statistics();
    }

    fn log_final_statistics(&self) {
        info!("📊 Final Statistics:");
        info!("  - Regions: {}", self.regions.len());
        if let Some(markers) = &self.markers {
            info!(
                "  - Map markers: {} nations | {} space",
                markers.len(NATIONS_SET),
                markers.len(SPACE_SET)
            );
        }
        for stats in self.caches.stats() {
            info!(
                "  - {}: {} entities | {} inserts | {} updates | {} deletes | {} duplicates | {} resyncs",
                stats.cache,
                stats.entities,
                stats.inserts,
                stats.updates,
                stats.deletes,
                stats.duplicates_ignored,
                stats.resyncs
            );
            if stats.decode_failures > 0 || stats.hook_failures > 0 {
                warn!(
                    "  ⚠️ {}: {} decode failures | {} hook failures",
                    stats.cache, stats.decode_failures, stats.hook_failures
                );
            }
        }
    }
}
