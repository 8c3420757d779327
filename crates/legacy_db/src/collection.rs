//! # Entity Store Facade
//!
//! Typed access to the store. [`Database`] owns the client and opens
//! transactions; [`Collection<T>`] is the per-entity API used outside of
//! transactions; [`Tx`] is the typed view handed to transaction bodies.
//!
//! ## Atomicity
//!
//! Every multi-document mutation goes through [`Database::trx`]. The body may
//! read, check preconditions with [`crate::ensure`] and write any number of
//! documents across collections. Returning an error discards all of it.
//!
//! ## Change streams
//!
//! [`Collection::watch`] subscribes to the collection's change feed and
//! decodes each event into a [`ChangeEvent<T>`], filtered by [`ChangeKind`].

use crate::error::DbError;
use crate::object::{decode, decode_event, encode, DbObject};
use crate::oid::Oid;
use crate::store::{ChangeKind, RawChange, Session, StoreClient};
use smallvec::SmallVec;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Handle to the persistent store. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    client: Arc<dyn StoreClient>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.client.name())
            .finish()
    }
}

impl Database {
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self { client }
    }

    pub fn name(&self) -> &str {
        self.client.name()
    }

    pub fn client(&self) -> &Arc<dyn StoreClient> {
        &self.client
    }

    pub fn collection<T: DbObject>(&self) -> Collection<T> {
        Collection {
            db: self.clone(),
            _marker: PhantomData,
        }
    }

    /// Runs `body` as one transaction and returns its result.
    ///
    /// Nothing written by `body` becomes visible, and no change events are
    /// published, unless it returns `Ok`.
    pub fn trx<R>(&self, body: impl FnOnce(&mut Tx<'_>) -> Result<R, DbError>) -> Result<R, DbError> {
        let mut body = Some(body);
        let mut output = None;
        self.client.transaction(&mut |session| {
            let body = body
                .take()
                .ok_or_else(|| DbError::stale("transaction body already ran"))?;
            let mut tx = Tx { session };
            output = Some(body(&mut tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| DbError::stale("transaction did not run"))
    }
}

/// Typed operations inside a transaction.
pub struct Tx<'a> {
    session: &'a mut dyn Session,
}

impl Tx<'_> {
    pub fn find<T: DbObject>(&self, id: Oid<T>) -> Result<Option<T>, DbError> {
        self.session
            .find_by_id(T::COLLECTION, id.raw())?
            .map(decode)
            .transpose()
    }

    /// Like [`Tx::find`], failing with [`DbError::NotFound`] when absent.
    pub fn get<T: DbObject>(&self, id: Oid<T>) -> Result<T, DbError> {
        self.find(id)?
            .ok_or_else(|| DbError::not_found(T::COLLECTION, id))
    }

    pub fn all<T: DbObject>(&self) -> Result<Vec<T>, DbError> {
        self.session
            .find_all(T::COLLECTION)?
            .into_iter()
            .map(|(_, document)| decode(document))
            .collect()
    }

    pub fn filter<T: DbObject>(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>, DbError> {
        Ok(self.all::<T>()?.into_iter().filter(|e| predicate(e)).collect())
    }

    pub fn exists<T: DbObject>(&self, id: Oid<T>) -> Result<bool, DbError> {
        Ok(self.session.find_by_id(T::COLLECTION, id.raw())?.is_some())
    }

    /// True when no entity satisfies `predicate`.
    pub fn none<T: DbObject>(&self, predicate: impl Fn(&T) -> bool) -> Result<bool, DbError> {
        Ok(!self.all::<T>()?.iter().any(predicate))
    }

    /// True when the entity exists and satisfies `predicate`.
    pub fn matches<T: DbObject>(&self, id: Oid<T>, predicate: impl FnOnce(&T) -> bool) -> Result<bool, DbError> {
        Ok(self.find(id)?.is_some_and(|e| predicate(&e)))
    }

    pub fn insert<T: DbObject>(&mut self, entity: &T) -> Result<Oid<T>, DbError> {
        let id = entity.id();
        self.session.insert(T::COLLECTION, id.raw(), encode(entity)?)?;
        Ok(id)
    }

    /// Replaces the stored snapshot of an existing entity.
    pub fn save<T: DbObject>(&mut self, entity: &T) -> Result<(), DbError> {
        self.session
            .replace(T::COLLECTION, entity.id().raw(), encode(entity)?)
    }

    pub fn upsert<T: DbObject>(&mut self, entity: &T) -> Result<(), DbError> {
        if self.exists(entity.id())? {
            self.save(entity)
        } else {
            self.insert(entity).map(|_| ())
        }
    }

    /// Applies `mutation` to the current snapshot and stores the result.
    pub fn update<T: DbObject>(&mut self, id: Oid<T>, mutation: impl FnOnce(&mut T)) -> Result<T, DbError> {
        let mut entity = self.get(id)?;
        mutation(&mut entity);
        self.save(&entity)?;
        Ok(entity)
    }

    /// Applies `mutation` to every entity matching `predicate`; returns how
    /// many snapshots actually changed.
    pub fn update_many<T: DbObject>(
        &mut self,
        predicate: impl Fn(&T) -> bool,
        mut mutation: impl FnMut(&mut T),
    ) -> Result<usize, DbError> {
        let mut changed = 0;
        for before in self.filter(predicate)? {
            let mut after = before.clone();
            mutation(&mut after);
            if after != before {
                self.save(&after)?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    pub fn delete<T: DbObject>(&mut self, id: Oid<T>) -> Result<bool, DbError> {
        self.session.delete(T::COLLECTION, id.raw())
    }

    pub fn delete_many<T: DbObject>(&mut self, predicate: impl Fn(&T) -> bool) -> Result<usize, DbError> {
        let mut deleted = 0;
        for entity in self.filter(predicate)? {
            if self.delete(entity.id())? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Per-entity API over one collection.
pub struct Collection<T> {
    db: Database,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: DbObject> Collection<T> {
    pub fn name(&self) -> &'static str {
        T::COLLECTION
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn create(&self, entity: &T) -> Result<Oid<T>, DbError> {
        self.db.trx(|tx| tx.insert(entity))
    }

    pub fn find(&self, id: Oid<T>) -> Result<Option<T>, DbError> {
        self.db
            .client
            .find_by_id(T::COLLECTION, id.raw())?
            .map(decode)
            .transpose()
    }

    pub fn get(&self, id: Oid<T>) -> Result<T, DbError> {
        self.find(id)?
            .ok_or_else(|| DbError::not_found(T::COLLECTION, id))
    }

    pub fn find_all(&self) -> Result<Vec<T>, DbError> {
        self.db
            .client
            .find_all(T::COLLECTION)?
            .into_iter()
            .map(|(_, document)| decode(document))
            .collect()
    }

    pub fn query(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>, DbError> {
        Ok(self.find_all()?.into_iter().filter(|e| predicate(e)).collect())
    }

    pub fn update(&self, id: Oid<T>, mutation: impl FnOnce(&mut T)) -> Result<T, DbError> {
        self.db.trx(|tx| tx.update(id, mutation))
    }

    pub fn delete(&self, id: Oid<T>) -> Result<bool, DbError> {
        self.db.trx(|tx| tx.delete(id))
    }

    pub fn exists(&self, id: Oid<T>) -> Result<bool, DbError> {
        Ok(self.db.client.find_by_id(T::COLLECTION, id.raw())?.is_some())
    }

    pub fn matches(&self, id: Oid<T>, predicate: impl FnOnce(&T) -> bool) -> Result<bool, DbError> {
        Ok(self.find(id)?.is_some_and(|e| predicate(&e)))
    }

    pub fn none(&self, predicate: impl Fn(&T) -> bool) -> Result<bool, DbError> {
        Ok(!self.find_all()?.iter().any(predicate))
    }

    /// Subscribes to changes of the given kinds.
    pub fn watch(&self, kinds: &[ChangeKind]) -> Result<ChangeStream<T>, DbError> {
        Ok(ChangeStream {
            receiver: self.db.client.watch(T::COLLECTION)?,
            kinds: kinds.iter().copied().collect(),
            _marker: PhantomData,
        })
    }

    pub fn watch_all(&self) -> Result<ChangeStream<T>, DbError> {
        self.watch(&[ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete])
    }

    pub fn watch_inserts(&self) -> Result<ChangeStream<T>, DbError> {
        self.watch(&[ChangeKind::Insert])
    }

    pub fn watch_updates(&self) -> Result<ChangeStream<T>, DbError> {
        self.watch(&[ChangeKind::Update])
    }

    pub fn watch_deletes(&self) -> Result<ChangeStream<T>, DbError> {
        self.watch(&[ChangeKind::Delete])
    }
}

/// A decoded change notification.
///
/// `document` is the full post-change snapshot for inserts and updates and
/// `None` for deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<T> {
    pub kind: ChangeKind,
    pub id: Oid<T>,
    pub document: Option<T>,
}

/// A typed subscription to one collection's change feed.
pub struct ChangeStream<T> {
    receiver: broadcast::Receiver<RawChange>,
    kinds: SmallVec<[ChangeKind; 3]>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DbObject> ChangeStream<T> {
    /// Waits for the next matching event.
    ///
    /// Returns `None` once the store closes the feed. A subscriber that fell
    /// behind receives a single [`DbError::Lagged`] and then continues with
    /// the oldest event still buffered. An event whose document does not
    /// decode yields [`DbError::EventDecode`]; the stream stays usable.
    pub async fn next(&mut self) -> Option<Result<ChangeEvent<T>, DbError>> {
        loop {
            match self.receiver.recv().await {
                Ok(raw) if self.kinds.contains(&raw.kind) => return Some(Self::decode(raw)),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    return Some(Err(DbError::Lagged {
                        collection: T::COLLECTION.to_string(),
                        skipped,
                    }))
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn decode(raw: RawChange) -> Result<ChangeEvent<T>, DbError> {
        let document = match (raw.kind, raw.document) {
            (ChangeKind::Delete, _) | (_, None) => None,
            (_, Some(document)) => Some(decode_event(raw.id, document)?),
        };
        Ok(ChangeEvent {
            kind: raw.kind,
            id: Oid::from_raw(raw.id),
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        #[serde(rename = "_id")]
        id: Oid<Widget>,
        name: String,
        size: u32,
    }

    impl DbObject for Widget {
        const COLLECTION: &'static str = "widget";

        fn id(&self) -> Oid<Self> {
            self.id
        }
    }

    fn widget(name: &str, size: u32) -> Widget {
        Widget {
            id: Oid::new(),
            name: name.to_string(),
            size,
        }
    }

    fn database() -> Database {
        Database::new(Arc::new(MemoryStore::new("test")))
    }

    #[test]
    fn create_find_update_delete() {
        let db = database();
        let widgets = db.collection::<Widget>();

        let w = widget("cog", 3);
        let id = widgets.create(&w).unwrap();
        assert_eq!(widgets.get(id).unwrap(), w);

        let updated = widgets.update(id, |w| w.size = 5).unwrap();
        assert_eq!(updated.size, 5);
        assert!(widgets.matches(id, |w| w.size == 5).unwrap());

        assert!(widgets.delete(id).unwrap());
        assert!(matches!(widgets.get(id), Err(DbError::NotFound { .. })));
        assert!(!widgets.delete(id).unwrap());
    }

    #[test]
    fn aborted_trx_writes_nothing() {
        let db = database();
        let widgets = db.collection::<Widget>();
        let w = widget("cog", 3);

        let result: Result<(), DbError> = db.trx(|tx| {
            tx.insert(&w)?;
            crate::ensure(false, || "already taken".to_string())
        });

        assert!(matches!(result, Err(DbError::StaleWrite(ref m)) if m == "already taken"));
        assert!(widgets.find_all().unwrap().is_empty());
    }

    #[test]
    fn update_many_counts_only_changes() {
        let db = database();
        let widgets = db.collection::<Widget>();
        for (name, size) in [("a", 1), ("b", 2), ("c", 2)] {
            widgets.create(&widget(name, size)).unwrap();
        }

        let changed = db
            .trx(|tx| tx.update_many::<Widget>(|w| w.size >= 1, |w| w.size = 2))
            .unwrap();
        assert_eq!(changed, 1);
        assert!(widgets.none(|w| w.size != 2).unwrap());
    }

    #[tokio::test]
    async fn watch_filters_by_kind() {
        let db = database();
        let widgets = db.collection::<Widget>();
        let mut deletes = widgets.watch_deletes().unwrap();
        let mut all = widgets.watch_all().unwrap();

        let id = widgets.create(&widget("cog", 1)).unwrap();
        widgets.delete(id).unwrap();

        let first = all.next().await.unwrap().unwrap();
        assert_eq!(first.kind, ChangeKind::Insert);
        assert_eq!(first.document.map(|w| w.name), Some("cog".to_string()));

        let deleted = deletes.next().await.unwrap().unwrap();
        assert_eq!(deleted.kind, ChangeKind::Delete);
        assert_eq!(deleted.id, id);
        assert!(deleted.document.is_none());
    }

    #[tokio::test]
    async fn undecodable_event_does_not_end_stream() {
        let store = Arc::new(MemoryStore::new("test"));
        let db = Database::new(store.clone());
        let widgets = db.collection::<Widget>();
        let mut stream = widgets.watch_all().unwrap();

        let bad = uuid::Uuid::now_v7();
        store
            .transaction(&mut |session| {
                session.insert("widget", bad, serde_json::json!({"_id": bad, "name": 7}))
            })
            .unwrap();
        let good = widgets.create(&widget("cog", 1)).unwrap();

        assert!(matches!(
            stream.next().await,
            Some(Err(DbError::EventDecode { .. }))
        ));
        assert_eq!(stream.next().await.unwrap().unwrap().id, good);
    }
}
