//! # Legacy Regions
//!
//! The spatial layer derived from the replicated caches: which claims cover a
//! position, who may build there, and whether it is hostile ground. Regions
//! and map markers follow the caches through hooks that hand their work to
//! the tick queue.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use legacy_cache::{CacheOptions, Caches, TickQueue};
//! use legacy_db::{Database, Location, MemoryStore};
//! use legacy_regions::{Regions, DEFAULT_FAILED_ACCESS_COOLDOWN};
//! use std::sync::Arc;
//!
//! # async fn run(player: legacy_db::schema::PlayerId) -> anyhow::Result<()> {
//! let db = Database::new(Arc::new(MemoryStore::new("legacy")));
//! let caches = Caches::new(&db, CacheOptions::default());
//! let tick = TickQueue::new();
//!
//! let regions = Arc::new(Regions::new(caches.clone(), DEFAULT_FAILED_ACCESS_COOLDOWN));
//! legacy_regions::sync::install(&regions, &tick);
//! caches.load_all().await?;
//! regions.load()?;
//!
//! if let Some(message) = regions.inaccess_message_at(player, &Location::new("overworld", 10, 64, 10)) {
//!     println!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

mod access;
pub mod cooldown;
pub mod error;
mod hostility;
pub mod map;
pub mod region;
pub mod regions;
mod spatial;
pub mod sync;

pub use cooldown::FailedAccessCooldown;
pub use error::RegionError;
pub use map::{MapBackend, MemoryMap, NationsMap, NoopMap, SpaceMap};
pub use region::{Claim, Region, RegionHandle, RegionKey, RegionKind};
pub use regions::{Regions, DEFAULT_FAILED_ACCESS_COOLDOWN};
