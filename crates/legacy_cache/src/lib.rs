//! # Legacy Cache
//!
//! In-memory replicas of the store's collections, kept current from each
//! collection's change feed and queryable through declared secondary indexes.
//!
//! ## Layers
//!
//! - [`ReplicatedCache`]: the generic engine (bulk load, live feed, indexes,
//!   hooks, lag recovery)
//! - [`caches`]: one specialized cache per entity type and the [`Caches`]
//!   composition root
//! - [`TickQueue`]: hands hook work over to the main tick loop
//!
//! ## Example
//!
//! ```rust,no_run
//! use legacy_cache::{CacheOptions, Caches};
//! use legacy_db::{Database, MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), legacy_cache::CacheError> {
//! let db = Database::new(Arc::new(MemoryStore::new("world")));
//! let caches = Caches::new(&db, CacheOptions::default());
//! caches.load_all().await?;
//!
//! if let Some(nation) = caches.nations.get_by_name("Horizon") {
//!     println!("{} has color {:06x}", nation.name, nation.color);
//! }
//! caches.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod caches;
pub mod error;
pub mod hooks;
pub mod index;
pub mod stats;
pub mod tick;

pub use cache::{CacheOptions, ReplicatedCache};
pub use caches::Caches;
pub use error::CacheError;
pub use hooks::{CacheChange, CacheHook, FnHook};
pub use index::{IndexHandle, IndexKey, IndexKind, Keys};
pub use stats::CacheStats;
pub use tick::{TickQueue, TickTask};
