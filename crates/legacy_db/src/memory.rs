//! # In-Process Store
//!
//! [`MemoryStore`] is a complete [`StoreClient`] that keeps every collection in
//! memory. It is what the server runs against when no external database is
//! configured, and what every test in the workspace uses.
//!
//! ## Transactions
//!
//! A transaction holds the store lock for its whole duration and stages its
//! writes in an overlay. Reads inside the transaction see the overlay first.
//! Only when the body returns `Ok` is the overlay applied, and only then are
//! change events published: one per affected id, classified by comparing the
//! document before and after the transaction. A document written back
//! unchanged produces no event.
//!
//! ## Change feeds
//!
//! Each collection owns a bounded [`broadcast`] channel. Subscribers that fall
//! behind observe a lag error and are expected to resynchronise from a bulk
//! read.

use crate::error::DbError;
use crate::store::{ChangeKind, Document, RawChange, Session, StoreClient};
use compact_str::CompactString;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Default number of buffered events per collection feed.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

type CollectionData = BTreeMap<Uuid, Document>;

/// An in-memory document store with transactions and change feeds.
pub struct MemoryStore {
    name: CompactString,
    data: Mutex<HashMap<CompactString, CollectionData>>,
    feeds: DashMap<CompactString, broadcast::Sender<RawChange>>,
    feed_capacity: usize,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self::with_feed_capacity(name, DEFAULT_FEED_CAPACITY)
    }

    /// Creates a store whose change feeds buffer at most `feed_capacity`
    /// events before slow subscribers start lagging.
    pub fn with_feed_capacity(name: impl Into<CompactString>, feed_capacity: usize) -> Self {
        let name = name.into();
        info!("🗄️ Opening in-memory store '{}' (feed capacity {})", name, feed_capacity);
        Self {
            name,
            data: Mutex::new(HashMap::new()),
            feeds: DashMap::new(),
            feed_capacity: feed_capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of documents currently stored in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.data.lock().get(collection).map_or(0, BTreeMap::len)
    }

    /// Closes the store. Every open change feed ends and further calls fail
    /// with [`DbError::Closed`].
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.feeds.clear();
        info!("🗄️ Store '{}' closed", self.name);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> Result<(), DbError> {
        if self.is_closed() {
            Err(DbError::Closed)
        } else {
            Ok(())
        }
    }

    fn publish(&self, change: RawChange) {
        if let Some(feed) = self.feeds.get(change.collection.as_str()) {
            trace!(
                collection = %change.collection,
                id = %change.id,
                kind = ?change.kind,
                "publishing change"
            );
            // No receivers is fine; nobody is watching this collection yet.
            let _ = feed.send(change);
        }
    }
}

impl StoreClient for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_all(&self, collection: &str) -> Result<Vec<(Uuid, Document)>, DbError> {
        self.check_open()?;
        let data = self.data.lock();
        Ok(data
            .get(collection)
            .map(|docs| docs.iter().map(|(id, doc)| (*id, doc.clone())).collect())
            .unwrap_or_default())
    }

    fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DbError> {
        self.check_open()?;
        let data = self.data.lock();
        Ok(data.get(collection).and_then(|docs| docs.get(&id)).cloned())
    }

    fn transaction(
        &self,
        body: &mut dyn FnMut(&mut dyn Session) -> Result<(), DbError>,
    ) -> Result<(), DbError> {
        self.check_open()?;
        let mut data = self.data.lock();

        let staged = {
            let mut session = MemorySession {
                committed: &*data,
                staged: BTreeMap::new(),
            };
            body(&mut session)?;
            session.staged
        };

        let mut changes = Vec::new();
        for ((collection, id), after) in staged {
            let docs = data.entry(collection.clone()).or_default();
            let before = docs.get(&id);
            let kind = match (before, &after) {
                (None, Some(_)) => ChangeKind::Insert,
                (Some(old), Some(new)) if old != new => ChangeKind::Update,
                (Some(_), None) => ChangeKind::Delete,
                _ => continue,
            };
            match &after {
                Some(doc) => {
                    docs.insert(id, doc.clone());
                }
                None => {
                    docs.remove(&id);
                }
            }
            changes.push(RawChange {
                collection,
                kind,
                id,
                document: after,
            });
        }

        debug!("🗄️ Committed transaction with {} change(s)", changes.len());

        // Published while the lock is held so feed order matches commit order.
        for change in changes {
            self.publish(change);
        }
        Ok(())
    }

    fn watch(&self, collection: &str) -> Result<broadcast::Receiver<RawChange>, DbError> {
        self.check_open()?;
        let feed = self
            .feeds
            .entry(CompactString::from(collection))
            .or_insert_with(|| broadcast::channel(self.feed_capacity).0);
        Ok(feed.subscribe())
    }
}

/// Overlay of writes staged by one transaction. `None` marks a deletion.
struct MemorySession<'a> {
    committed: &'a HashMap<CompactString, CollectionData>,
    staged: BTreeMap<(CompactString, Uuid), Option<Document>>,
}

impl MemorySession<'_> {
    fn current(&self, collection: &str, id: Uuid) -> Option<&Document> {
        match self.staged.get(&(CompactString::from(collection), id)) {
            Some(staged) => staged.as_ref(),
            None => self.committed.get(collection).and_then(|docs| docs.get(&id)),
        }
    }
}

impl Session for MemorySession<'_> {
    fn find_all(&self, collection: &str) -> Result<Vec<(Uuid, Document)>, DbError> {
        let mut merged: BTreeMap<Uuid, &Document> = self
            .committed
            .get(collection)
            .map(|docs| docs.iter().map(|(id, doc)| (*id, doc)).collect())
            .unwrap_or_default();

        for ((staged_collection, id), staged) in &self.staged {
            if staged_collection.as_str() != collection {
                continue;
            }
            match staged {
                Some(doc) => {
                    merged.insert(*id, doc);
                }
                None => {
                    merged.remove(id);
                }
            }
        }

        Ok(merged.into_iter().map(|(id, doc)| (id, doc.clone())).collect())
    }

    fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, DbError> {
        Ok(self.current(collection, id).cloned())
    }

    fn insert(&mut self, collection: &str, id: Uuid, document: Document) -> Result<(), DbError> {
        if self.current(collection, id).is_some() {
            return Err(DbError::Duplicate {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.staged
            .insert((CompactString::from(collection), id), Some(document));
        Ok(())
    }

    fn replace(&mut self, collection: &str, id: Uuid, document: Document) -> Result<(), DbError> {
        if self.current(collection, id).is_none() {
            return Err(DbError::not_found(collection, id));
        }
        self.staged
            .insert((CompactString::from(collection), id), Some(document));
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: Uuid) -> Result<bool, DbError> {
        if self.current(collection, id).is_none() {
            return Ok(false);
        }
        self.staged.insert((CompactString::from(collection), id), None);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insert(store: &MemoryStore, collection: &str, id: Uuid, doc: Document) {
        store
            .transaction(&mut |session| session.insert(collection, id, doc.clone()))
            .unwrap();
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = MemoryStore::new("test");
        let mut feed = store.watch("things").unwrap();
        let id = Uuid::now_v7();

        let result = store.transaction(&mut |session| {
            session.insert("things", id, json!({"_id": id, "n": 1}))?;
            Err(DbError::stale("nope"))
        });

        assert!(matches!(result, Err(DbError::StaleWrite(_))));
        assert_eq!(store.count("things"), 0);
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn reads_inside_transaction_see_staged_writes() {
        let store = MemoryStore::new("test");
        let id = Uuid::now_v7();
        insert(&store, "things", id, json!({"_id": id, "n": 1}));

        store
            .transaction(&mut |session| {
                session.replace("things", id, json!({"_id": id, "n": 2}))?;
                let seen = session.find_by_id("things", id)?;
                assert_eq!(seen, Some(json!({"_id": id, "n": 2})));
                assert!(session.delete("things", id)?);
                assert!(session.find_all("things")?.is_empty());
                Ok(())
            })
            .unwrap();

        assert_eq!(store.count("things"), 0);
    }

    #[test]
    fn one_event_per_affected_id() {
        let store = MemoryStore::new("test");
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        insert(&store, "things", a, json!({"_id": a, "n": 1}));

        let mut feed = store.watch("things").unwrap();
        store
            .transaction(&mut |session| {
                session.replace("things", a, json!({"_id": a, "n": 2}))?;
                session.replace("things", a, json!({"_id": a, "n": 3}))?;
                session.insert("things", b, json!({"_id": b}))?;
                session.delete("things", b)?;
                Ok(())
            })
            .unwrap();

        let change = feed.try_recv().unwrap();
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.id, a);
        assert_eq!(change.document, Some(json!({"_id": a, "n": 3})));
        // b was created and removed inside the same transaction
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn unchanged_rewrite_is_silent() {
        let store = MemoryStore::new("test");
        let id = Uuid::now_v7();
        insert(&store, "things", id, json!({"_id": id}));

        let mut feed = store.watch("things").unwrap();
        store
            .transaction(&mut |session| session.replace("things", id, json!({"_id": id})))
            .unwrap();
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = MemoryStore::new("test");
        let id = Uuid::now_v7();
        insert(&store, "things", id, json!({"_id": id}));

        let result = store.transaction(&mut |session| session.insert("things", id, json!({})));
        assert!(matches!(result, Err(DbError::Duplicate { .. })));
    }

    #[test]
    fn shutdown_closes_feeds() {
        let store = MemoryStore::new("test");
        let mut feed = store.watch("things").unwrap();
        store.shutdown();

        assert!(matches!(
            feed.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
        assert!(matches!(store.find_all("things"), Err(DbError::Closed)));
    }
}
