//! Lifecycle hooks fired after a change has been applied to a cache.
//!
//! Hooks see immutable snapshots. They run on the cache's feed consumer, one
//! event at a time, after the entity set and every index already reflect the
//! event. Anything that touches tick-owned state must post itself to the
//! [`crate::TickQueue`] instead of doing the work inline.

use std::sync::Arc;

/// An applied change, as seen by hooks.
#[derive(Debug, Clone)]
pub enum CacheChange<T> {
    Inserted(Arc<T>),
    Updated { old: Arc<T>, new: Arc<T> },
    Deleted(Arc<T>),
}

impl<T> CacheChange<T> {
    /// The snapshot that is current after the change, or the removed one.
    pub fn entity(&self) -> &Arc<T> {
        match self {
            CacheChange::Inserted(entity) | CacheChange::Deleted(entity) => entity,
            CacheChange::Updated { new, .. } => new,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CacheChange::Inserted(_) => "insert",
            CacheChange::Updated { .. } => "update",
            CacheChange::Deleted(_) => "delete",
        }
    }
}

/// Receives insert/update/delete notifications from a cache.
///
/// Errors and panics are caught by the cache, logged with the hook name and
/// entity id, and never undo the change.
///
/// Hooks run while the cache holds its writer lock. They may read any cache
/// but must not apply events, resync, or declare indexes on the cache that
/// invoked them; doing so deadlocks.
pub trait CacheHook<T>: Send + Sync {
    fn name(&self) -> &str;

    fn on_insert(&self, _entity: &Arc<T>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_update(&self, _old: &Arc<T>, _new: &Arc<T>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_delete(&self, _entity: &Arc<T>) -> anyhow::Result<()> {
        Ok(())
    }
}

pub(crate) fn dispatch<T>(hook: &dyn CacheHook<T>, change: &CacheChange<T>) -> anyhow::Result<()> {
    match change {
        CacheChange::Inserted(entity) => hook.on_insert(entity),
        CacheChange::Updated { old, new } => hook.on_update(old, new),
        CacheChange::Deleted(entity) => hook.on_delete(entity),
    }
}

/// A hook built from a single closure over [`CacheChange`].
pub struct FnHook<F> {
    name: String,
    callback: F,
}

impl<F> FnHook<F> {
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl<T, F> CacheHook<T> for FnHook<F>
where
    F: Fn(&CacheChange<T>) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_insert(&self, entity: &Arc<T>) -> anyhow::Result<()> {
        (self.callback)(&CacheChange::Inserted(entity.clone()))
    }

    fn on_update(&self, old: &Arc<T>, new: &Arc<T>) -> anyhow::Result<()> {
        (self.callback)(&CacheChange::Updated {
            old: old.clone(),
            new: new.clone(),
        })
    }

    fn on_delete(&self, entity: &Arc<T>) -> anyhow::Result<()> {
        (self.callback)(&CacheChange::Deleted(entity.clone()))
    }
}
