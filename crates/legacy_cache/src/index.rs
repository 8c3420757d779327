//! # Secondary Indexes
//!
//! An index is a pure key-extraction function plus a map from key to the
//! ordered set of ids currently producing that key. Extractors may yield zero,
//! one or several keys per entity, which covers optional fields
//! (`Option<K>` is an iterator) and set-valued fields alike. Compound indexes
//! are plain tuple keys.
//!
//! Buckets are `BTreeSet`s, so every query returns entities in ascending id
//! order and "first match" is always the smallest id.

use compact_str::CompactString;
use legacy_db::Oid;
use smallvec::SmallVec;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use tracing::warn;

/// Keys produced by one entity for one index.
pub type Keys<K> = SmallVec<[K; 2]>;

/// Whether a key may be shared between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// At most one entity per key is expected. A second entity claiming a
    /// taken key is logged, and every holder stays indexed so that removing
    /// one leaves the others findable. Lookups return the smallest id.
    Unique,
    /// Any number of entities per key.
    Hash,
}

/// Requirements on index key types.
pub trait IndexKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static> IndexKey for K {}

/// Typed handle returned when an index is declared.
pub struct IndexHandle<T, K> {
    pub(crate) slot: usize,
    name: CompactString,
    _marker: PhantomData<fn(&T) -> K>,
}

impl<T, K> IndexHandle<T, K> {
    pub(crate) fn new(slot: usize, name: CompactString) -> Self {
        Self {
            slot,
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T, K> Clone for IndexHandle<T, K> {
    fn clone(&self) -> Self {
        Self::new(self.slot, self.name.clone())
    }
}

impl<T, K> fmt::Debug for IndexHandle<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("slot", &self.slot)
            .field("name", &self.name)
            .finish()
    }
}

/// Type-erased view the engine uses to maintain every index uniformly.
pub(crate) trait ErasedIndex<T>: Send + Sync {
    fn name(&self) -> &str;

    fn insert(&mut self, id: Oid<T>, entity: &T);

    fn remove(&mut self, id: Oid<T>, entity: &T);

    /// Whether `old` and `new` produce different keys.
    fn keys_changed(&self, old: &T, new: &T) -> bool;

    fn key_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct Index<T, K> {
    name: CompactString,
    kind: IndexKind,
    extract: Box<dyn Fn(&T) -> Keys<K> + Send + Sync>,
    buckets: HashMap<K, BTreeSet<Oid<T>>>,
}

impl<T, K: IndexKey> Index<T, K> {
    pub(crate) fn new(
        name: CompactString,
        kind: IndexKind,
        extract: Box<dyn Fn(&T) -> Keys<K> + Send + Sync>,
    ) -> Self {
        Self {
            name,
            kind,
            extract,
            buckets: HashMap::new(),
        }
    }

    pub(crate) fn ids(&self, key: &K) -> impl Iterator<Item = Oid<T>> + '_ {
        self.buckets.get(key).into_iter().flatten().copied()
    }

    pub(crate) fn first(&self, key: &K) -> Option<Oid<T>> {
        self.buckets.get(key).and_then(|ids| ids.first().copied())
    }

    #[cfg(test)]
    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl<T: Send + Sync + 'static, K: IndexKey> ErasedIndex<T> for Index<T, K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&mut self, id: Oid<T>, entity: &T) {
        for key in (self.extract)(entity) {
            let bucket = self.buckets.entry(key).or_default();
            if self.kind == IndexKind::Unique {
                if let Some(holder) = bucket.iter().find(|held| **held != id) {
                    warn!(
                        index = %self.name,
                        holder = %holder,
                        id = %id,
                        "unique index violated, key is shared"
                    );
                }
            }
            bucket.insert(id);
        }
    }

    fn remove(&mut self, id: Oid<T>, entity: &T) {
        for key in (self.extract)(entity) {
            if let Some(bucket) = self.buckets.get_mut(&key) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    self.buckets.remove(&key);
                }
            }
        }
    }

    fn keys_changed(&self, old: &T, new: &T) -> bool {
        (self.extract)(old) != (self.extract)(new)
    }

    fn key_type(&self) -> &'static str {
        std::any::type_name::<K>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
