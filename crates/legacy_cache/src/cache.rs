//! # Replicated Indexed Cache
//!
//! [`ReplicatedCache<T>`] mirrors one collection in memory and keeps the
//! mirror current from the collection's change feed.
//!
//! ## Lifecycle
//!
//! 1. Construct the cache and declare its secondary indexes.
//! 2. [`ReplicatedCache::load`] subscribes to the feed *first*, then bulk
//!    reads the collection off the async workers. Events committed while the
//!    bulk read runs are buffered in the subscription and replayed afterwards;
//!    the ones already reflected by the bulk read are recognised as
//!    duplicates and ignored.
//! 3. A single consumer task applies every subsequent event in feed order.
//! 4. [`ReplicatedCache::shutdown`] stops the consumer.
//!
//! ## Applying an event
//!
//! Inserts and updates are both upserts of the full snapshot: an insert for
//! an id already cached with an identical snapshot is a no-op, an insert with
//! a different snapshot acts as an update, and an update for an unknown id
//! acts as an insert. Deletes remove the snapshot. Only indexes whose
//! extracted keys differ between the old and new snapshot are touched.
//!
//! The entity map and every index live behind one `RwLock`, so readers never
//! observe one updated without the others. Writers are serialised by a
//! separate mutex that is also held while hooks run; hooks therefore see
//! events one at a time and may freely read this and other caches. The mutex
//! is not reentrant: a hook must not call [`ReplicatedCache::apply`],
//! [`ReplicatedCache::resync`] or declare indexes on its own cache. Work of
//! that kind belongs on the tick queue.
//!
//! ## Failure containment
//!
//! Undecodable events are logged and dropped. Hook errors and panics are
//! logged with the hook name and entity id; the applied change stands. If the
//! subscriber lags behind the feed, the cache resynchronises from a fresh bulk
//! read and fires hooks for every difference it finds.

use crate::error::CacheError;
use crate::hooks::{dispatch, CacheChange, CacheHook};
use crate::index::{ErasedIndex, Index, IndexHandle, IndexKey, IndexKind, Keys};
use crate::stats::{CacheStats, Counters};
use compact_str::CompactString;
use legacy_db::{ChangeEvent, ChangeKind, ChangeStream, Collection, Database, DbError, DbObject, Oid};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Behaviour switches for a cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Rebuild from a bulk read when the feed reports lost events.
    pub resync_on_lag: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { resync_on_lag: true }
    }
}

/// An in-memory, indexed, feed-maintained mirror of one collection.
///
/// Cloning yields another handle to the same cache.
pub struct ReplicatedCache<T: DbObject> {
    inner: Arc<Inner<T>>,
}

impl<T: DbObject> Clone for ReplicatedCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T: DbObject> {
    name: CompactString,
    collection: Collection<T>,
    options: CacheOptions,
    state: RwLock<State<T>>,
    hooks: RwLock<Vec<Arc<dyn CacheHook<T>>>>,
    writer: Mutex<()>,
    counters: Counters,
    loaded: AtomicBool,
    stop: Notify,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

struct State<T> {
    entities: HashMap<Oid<T>, Arc<T>>,
    indexes: Vec<Box<dyn ErasedIndex<T>>>,
}

impl<T: DbObject> State<T> {
    fn upsert(&mut self, new: Arc<T>) -> Option<CacheChange<T>> {
        let id = new.id();
        match self.entities.get(&id).cloned() {
            Some(old) if *old == *new => None,
            Some(old) => {
                for index in &mut self.indexes {
                    if index.keys_changed(&old, &new) {
                        index.remove(id, &old);
                        index.insert(id, &new);
                    }
                }
                self.entities.insert(id, new.clone());
                Some(CacheChange::Updated { old, new })
            }
            None => {
                for index in &mut self.indexes {
                    index.insert(id, &new);
                }
                self.entities.insert(id, new.clone());
                Some(CacheChange::Inserted(new))
            }
        }
    }

    fn remove(&mut self, id: Oid<T>) -> Option<Arc<T>> {
        let old = self.entities.remove(&id)?;
        for index in &mut self.indexes {
            index.remove(id, &old);
        }
        Some(old)
    }

    fn lookup<K: IndexKey>(&self, slot: usize) -> Option<&Index<T, K>> {
        self.indexes
            .get(slot)
            .and_then(|index| index.as_any().downcast_ref::<Index<T, K>>())
    }

    fn resolve(&self, ids: impl Iterator<Item = Oid<T>>) -> Vec<Arc<T>> {
        ids.filter_map(|id| self.entities.get(&id).cloned()).collect()
    }
}

impl<T: DbObject> ReplicatedCache<T> {
    pub fn new(db: &Database, name: impl Into<CompactString>) -> Self {
        Self::with_options(db, name, CacheOptions::default())
    }

    pub fn with_options(db: &Database, name: impl Into<CompactString>, options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                collection: db.collection::<T>(),
                options,
                state: RwLock::new(State {
                    entities: HashMap::new(),
                    indexes: Vec::new(),
                }),
                hooks: RwLock::new(Vec::new()),
                writer: Mutex::new(()),
                counters: Counters::default(),
                loaded: AtomicBool::new(false),
                stop: Notify::new(),
                consumer: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn collection(&self) -> &Collection<T> {
        &self.inner.collection
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    // ---- indexes ----

    /// Declares an index with exactly one key per entity.
    pub fn add_index<K: IndexKey>(
        &self,
        name: &str,
        kind: IndexKind,
        extract: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> IndexHandle<T, K> {
        self.add_multi_index(name, kind, move |entity: &T| std::iter::once(extract(entity)))
    }

    /// Declares an index whose extractor yields any number of keys per
    /// entity. `Option<K>` works as an extractor result for optional fields.
    ///
    /// Declaring after [`ReplicatedCache::load`] builds the index from the
    /// current contents before returning. Re-declaring a name replaces the
    /// previous index.
    pub fn add_multi_index<K, I>(
        &self,
        name: &str,
        kind: IndexKind,
        extract: impl Fn(&T) -> I + Send + Sync + 'static,
    ) -> IndexHandle<T, K>
    where
        K: IndexKey,
        I: IntoIterator<Item = K> + 'static,
    {
        let extract = move |entity: &T| -> Keys<K> { extract(entity).into_iter().collect() };
        let mut index = Index::new(CompactString::from(name), kind, Box::new(extract));

        let _writer = self.inner.writer.lock();
        let mut state = self.inner.state.write();
        for (id, entity) in &state.entities {
            index.insert(*id, entity);
        }

        let slot = match state.indexes.iter().position(|existing| existing.name() == name) {
            Some(slot) => {
                warn!(cache = %self.inner.name, index = name, "index redeclared, replacing");
                state.indexes[slot] = Box::new(index);
                slot
            }
            None => {
                state.indexes.push(Box::new(index));
                state.indexes.len() - 1
            }
        };
        debug!(cache = %self.inner.name, index = name, slot, "index declared");
        IndexHandle::new(slot, CompactString::from(name))
    }

    pub fn index_names(&self) -> Vec<String> {
        self.inner
            .state
            .read()
            .indexes
            .iter()
            .map(|index| index.name().to_string())
            .collect()
    }

    // ---- reads ----

    /// The cached snapshot for `id`, which callers presume to exist.
    pub fn get(&self, id: Oid<T>) -> Result<Arc<T>, CacheError> {
        self.try_get(id).ok_or_else(|| CacheError::NotFound {
            cache: self.inner.name.to_string(),
            id: id.to_string(),
        })
    }

    pub fn try_get(&self, id: Oid<T>) -> Option<Arc<T>> {
        self.inner.state.read().entities.get(&id).cloned()
    }

    pub fn contains(&self, id: Oid<T>) -> bool {
        self.inner.state.read().entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every cached entity, ordered by id.
    pub fn all(&self) -> Vec<Arc<T>> {
        let mut all: Vec<Arc<T>> = self.inner.state.read().entities.values().cloned().collect();
        all.sort_by_key(|entity| entity.id());
        all
    }

    /// Entities whose extracted keys include `key`, ordered by id.
    pub fn query<K: IndexKey>(&self, index: &IndexHandle<T, K>, key: &K) -> Vec<Arc<T>> {
        let state = self.inner.state.read();
        match state.lookup::<K>(index.slot) {
            Some(found) => state.resolve(found.ids(key)),
            None => {
                warn!(cache = %self.inner.name, index = index.name(), "handle does not belong to this cache");
                Vec::new()
            }
        }
    }

    /// The smallest-id entity under `key`.
    pub fn query_first<K: IndexKey>(&self, index: &IndexHandle<T, K>, key: &K) -> Option<Arc<T>> {
        let state = self.inner.state.read();
        let id = state.lookup::<K>(index.slot)?.first(key)?;
        state.entities.get(&id).cloned()
    }

    /// Queries an index by its declared name.
    pub fn query_by_name<K: IndexKey>(&self, name: &str, key: &K) -> Result<Vec<Arc<T>>, CacheError> {
        let state = self.inner.state.read();
        let index = state
            .indexes
            .iter()
            .find(|index| index.name() == name)
            .ok_or_else(|| CacheError::UnknownIndex {
                cache: self.inner.name.to_string(),
                index: name.to_string(),
            })?;
        let typed = index
            .as_any()
            .downcast_ref::<Index<T, K>>()
            .ok_or_else(|| CacheError::IndexKeyType {
                cache: self.inner.name.to_string(),
                index: format!("{name} ({})", index.key_type()),
                expected: std::any::type_name::<K>(),
            })?;
        Ok(state.resolve(typed.ids(key)))
    }

    // ---- hooks ----

    pub fn add_hook(&self, hook: Arc<dyn CacheHook<T>>) {
        debug!(cache = %self.inner.name, hook = hook.name(), "hook registered");
        self.inner.hooks.write().push(hook);
    }

    // ---- feed ----

    /// Bulk loads the collection and starts following its change feed.
    /// Returns the number of entities loaded.
    pub async fn load(&self) -> Result<usize, CacheError> {
        if self.inner.loaded.swap(true, Ordering::AcqRel) {
            return Err(CacheError::AlreadyLoaded(self.inner.name.to_string()));
        }

        match self.start().await {
            Ok(count) => {
                info!("📦 {} loaded {} entities", self.inner.name, count);
                Ok(count)
            }
            Err(err) => {
                self.inner.loaded.store(false, Ordering::Release);
                error!("❌ {} failed to load: {}", self.inner.name, err);
                Err(err)
            }
        }
    }

    async fn start(&self) -> Result<usize, CacheError> {
        let stream = self.inner.collection.watch_all()?;

        let worker = self.inner.clone();
        let count = tokio::task::spawn_blocking(move || worker.bulk_load())
            .await
            .map_err(|err| CacheError::Task(err.to_string()))??;

        let handle = tokio::spawn(consume(self.inner.clone(), stream));
        *self.inner.consumer.lock() = Some(handle);
        Ok(count)
    }

    /// Applies one change event, as the feed consumer does.
    ///
    /// Returns the change that was applied, or `None` when the event was a
    /// duplicate or undeliverable.
    pub fn apply(&self, event: ChangeEvent<T>) -> Option<CacheChange<T>> {
        self.inner.apply(event)
    }

    /// Re-reads the whole collection and applies the differences as synthetic
    /// events. Returns how many changes were found.
    pub fn resync(&self) -> Result<usize, CacheError> {
        if !self.is_loaded() {
            return Err(CacheError::NotLoaded(self.inner.name.to_string()));
        }
        self.inner.resync()
    }

    /// Stops the feed consumer. Cached contents stay readable.
    pub async fn shutdown(&self) {
        let handle = self.inner.consumer.lock().take();
        if let Some(handle) = handle {
            self.inner.stop.notify_one();
            if let Err(err) = handle.await {
                warn!("⚠️ {} feed consumer ended abnormally: {}", self.inner.name, err);
            }
            debug!("{} feed consumer stopped", self.inner.name);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.read();
        self.inner
            .counters
            .snapshot(&self.inner.name, state.entities.len(), state.indexes.len())
    }
}

impl<T: DbObject> Inner<T> {
    fn apply(&self, event: ChangeEvent<T>) -> Option<CacheChange<T>> {
        let _writer = self.writer.lock();

        let change = match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(entity) = event.document else {
                    Counters::bump(&self.counters.decode_failures);
                    warn!(cache = %self.name, id = %event.id, kind = ?event.kind, "⚠️ dropping change without a document");
                    return None;
                };
                if entity.id() != event.id {
                    Counters::bump(&self.counters.decode_failures);
                    warn!(cache = %self.name, id = %event.id, "⚠️ dropping change whose document carries another id");
                    return None;
                }
                self.state.write().upsert(Arc::new(entity))
            }
            ChangeKind::Delete => self.state.write().remove(event.id).map(CacheChange::Deleted),
        };

        match &change {
            Some(change) => {
                self.count(change);
                debug!(cache = %self.name, id = %event.id, change = change.label(), "applied");
                self.run_hooks(change);
            }
            None => {
                Counters::bump(&self.counters.duplicates_ignored);
                debug!(cache = %self.name, id = %event.id, kind = ?event.kind, "event already reflected, ignored");
            }
        }
        change
    }

    fn bulk_load(&self) -> Result<usize, CacheError> {
        let _writer = self.writer.lock();
        let snapshot = self.fetch_snapshot()?;
        let mut state = self.state.write();
        for entity in snapshot {
            state.upsert(Arc::new(entity));
        }
        Ok(state.entities.len())
    }

    /// The writer lock is taken before the bulk read so that no feed event
    /// can be applied in between and then rolled back by the older snapshot.
    fn resync(&self) -> Result<usize, CacheError> {
        let _writer = self.writer.lock();
        let snapshot = self.fetch_snapshot()?;

        let changes = {
            let mut state = self.state.write();
            let fresh: HashSet<Oid<T>> = snapshot.iter().map(|entity| entity.id()).collect();
            let mut changes: Vec<CacheChange<T>> = snapshot
                .into_iter()
                .filter_map(|entity| state.upsert(Arc::new(entity)))
                .collect();

            let mut stale: Vec<Oid<T>> = state
                .entities
                .keys()
                .filter(|id| !fresh.contains(id))
                .copied()
                .collect();
            stale.sort();
            changes.extend(
                stale
                    .into_iter()
                    .filter_map(|id| state.remove(id))
                    .map(CacheChange::Deleted),
            );
            changes
        };

        Counters::bump(&self.counters.resyncs);
        info!("🔄 {} resynchronised, {} change(s)", self.name, changes.len());
        for change in &changes {
            self.count(change);
            self.run_hooks(change);
        }
        Ok(changes.len())
    }

    /// Reads the whole collection, skipping documents that do not decode.
    fn fetch_snapshot(&self) -> Result<Vec<T>, CacheError> {
        let documents = self
            .collection
            .database()
            .client()
            .find_all(T::COLLECTION)?;

        let mut entities = Vec::with_capacity(documents.len());
        for (id, document) in documents {
            match serde_json::from_value::<T>(document) {
                Ok(entity) => entities.push(entity),
                Err(err) => {
                    Counters::bump(&self.counters.decode_failures);
                    let err = CacheError::FeedDecode {
                        cache: self.name.to_string(),
                        message: format!("{id}: {err}"),
                    };
                    warn!("⚠️ {}", err);
                }
            }
        }
        Ok(entities)
    }

    fn count(&self, change: &CacheChange<T>) {
        let counter = match change {
            CacheChange::Inserted(_) => &self.counters.inserts,
            CacheChange::Updated { .. } => &self.counters.updates,
            CacheChange::Deleted(_) => &self.counters.deletes,
        };
        Counters::bump(counter);
    }

    fn run_hooks(&self, change: &CacheChange<T>) {
        let hooks: Vec<Arc<dyn CacheHook<T>>> = self.hooks.read().clone();
        for hook in hooks {
            let outcome = catch_unwind(AssertUnwindSafe(|| dispatch(hook.as_ref(), change)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(_) => "hook panicked".to_string(),
            };
            Counters::bump(&self.counters.hook_failures);
            let failure = CacheError::Hook {
                hook: hook.name().to_string(),
                id: change.entity().id().to_string(),
                message,
            };
            error!(cache = %self.name, change = change.label(), "❌ {}", failure);
        }
    }
}

async fn consume<T: DbObject>(inner: Arc<Inner<T>>, mut stream: ChangeStream<T>) {
    debug!("{} following change feed", inner.name);
    loop {
        let next = tokio::select! {
            _ = inner.stop.notified() => break,
            next = stream.next() => next,
        };

        match next {
            None => {
                debug!("{} change feed closed", inner.name);
                break;
            }
            Some(Ok(event)) => {
                inner.apply(event);
            }
            Some(Err(DbError::Lagged { skipped, .. })) => {
                warn!("⚠️ {} fell behind its change feed by {} event(s)", inner.name, skipped);
                if inner.options.resync_on_lag {
                    let worker = inner.clone();
                    match tokio::task::spawn_blocking(move || worker.resync()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => error!("❌ {} resync failed: {}", inner.name, err),
                        Err(err) => error!("❌ {} resync task failed: {}", inner.name, err),
                    }
                }
            }
            Some(Err(err)) => {
                Counters::bump(&inner.counters.decode_failures);
                warn!("⚠️ {} dropped change event: {}", inner.name, err);
            }
        }
    }
}
