use legacy_db::DbError;
use thiserror::Error;

/// Errors surfaced by replicated caches.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A presumed-existing id is not cached.
    #[error("{cache}: {id} not cached")]
    NotFound { cache: String, id: String },

    #[error("{cache}: no index named '{index}'")]
    UnknownIndex { cache: String, index: String },

    /// A name-based query used a key type different from the index's.
    #[error("{cache}: index '{index}' is not keyed by {expected}")]
    IndexKeyType {
        cache: String,
        index: String,
        expected: &'static str,
    },

    #[error("{0} has not been loaded")]
    NotLoaded(String),

    #[error("{0} is already loaded")]
    AlreadyLoaded(String),

    /// A change event or stored document did not decode.
    #[error("{cache}: dropped undecodable document: {message}")]
    FeedDecode { cache: String, message: String },

    /// A downstream hook failed; the cache's own state was kept.
    #[error("hook '{hook}' failed for {id}: {message}")]
    Hook {
        hook: String,
        id: String,
        message: String,
    },

    #[error("background task failed: {0}")]
    Task(String),

    #[error("store error: {0}")]
    Db(#[from] DbError),
}
