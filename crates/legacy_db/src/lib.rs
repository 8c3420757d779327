//! # Legacy DB
//!
//! The persistence layer of the server: typed identifiers, the store client
//! boundary, an in-process store implementation, the typed entity facade and
//! the document schema with its transactional operations.
//!
//! ## Layers
//!
//! - [`Oid`]: typed, time-ordered identifiers
//! - [`StoreClient`] / [`Session`]: the raw store contract, JSON documents
//! - [`MemoryStore`]: in-process store with transactions and change feeds
//! - [`Database`], [`Collection`], [`Tx`]: typed access and change streams
//! - [`schema`]: persisted entity types and their operations
//!
//! ## Quick Start
//!
//! ```rust
//! use legacy_db::{Database, MemoryStore, schema::{Player, Settlement}, Oid};
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! let db = Database::new(Arc::new(MemoryStore::new("world")));
//! let leader = Oid::new();
//! Player::register(&db, leader, "Steve")?;
//!
//! let id = Settlement::create(&db, "overworld", BTreeSet::from([0]), "Foo", leader)?;
//! assert_eq!(db.collection::<Settlement>().get(id)?.name, "Foo");
//! # Ok::<(), legacy_db::DbError>(())
//! ```

pub mod collection;
pub mod error;
pub mod geometry;
pub mod memory;
pub mod object;
pub mod oid;
pub mod schema;
pub mod store;

pub use collection::{ChangeEvent, ChangeStream, Collection, Database, Tx};
pub use error::{ensure, DbError};
pub use geometry::{ChunkKey, Location, Vec3i};
pub use memory::MemoryStore;
pub use object::DbObject;
pub use oid::Oid;
pub use store::{ChangeKind, Document, RawChange, Session, StoreClient, ID_FIELD};
