//! # Store Client Boundary
//!
//! The persistent store is an external collaborator. This module defines the
//! narrow contract the rest of the workspace relies on:
//!
//! - bulk and point reads per collection
//! - all-or-nothing transactions over a [`Session`]
//! - a per-collection change feed of [`RawChange`] notifications
//!
//! Documents are opaque JSON values keyed by a raw UUID. Decoding into typed
//! entities happens one layer up, in [`crate::Collection`].

use crate::error::DbError;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// The store's native document encoding.
pub type Document = serde_json::Value;

/// Name of the field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// Kind of change reported by a change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// An undecoded change notification.
///
/// `document` holds the full post-change document for inserts and updates and
/// is `None` for deletes, where only the id is known.
#[derive(Debug, Clone)]
pub struct RawChange {
    pub collection: CompactString,
    pub kind: ChangeKind,
    pub id: Uuid,
    pub document: Option<Document>,
}

/// Read/write view used inside a transaction.
///
/// Reads observe the transaction's own staged writes.
pub trait Session {
    fn find_all(&self, collection: &str) -> Result<Vec<(Uuid, Document)>, DbError>;

    fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DbError>;

    /// Fails with [`DbError::Duplicate`] if the id is taken.
    fn insert(&mut self, collection: &str, id: Uuid, document: Document) -> Result<(), DbError>;

    /// Fails with [`DbError::NotFound`] if the id is absent.
    fn replace(&mut self, collection: &str, id: Uuid, document: Document) -> Result<(), DbError>;

    /// Returns whether a document was removed.
    fn delete(&mut self, collection: &str, id: Uuid) -> Result<bool, DbError>;
}

/// The persistent store.
///
/// Calls block the calling thread; async callers should hop onto a blocking
/// worker for anything but trivial reads.
pub trait StoreClient: Send + Sync + 'static {
    /// Human-readable name for logs (database name, connection label).
    fn name(&self) -> &str;

    fn find_all(&self, collection: &str) -> Result<Vec<(Uuid, Document)>, DbError>;

    fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DbError>;

    /// Runs `body` as one atomic unit.
    ///
    /// If `body` returns an error, none of its writes become visible and no
    /// change events are published. On success every affected id produces
    /// exactly one change event on its collection's feed.
    fn transaction(
        &self,
        body: &mut dyn FnMut(&mut dyn Session) -> Result<(), DbError>,
    ) -> Result<(), DbError>;

    /// Subscribes to the change feed of `collection`.
    ///
    /// Events published before the call are not replayed.
    fn watch(&self, collection: &str) -> Result<broadcast::Receiver<RawChange>, DbError>;
}
