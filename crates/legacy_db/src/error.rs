//! Error types for the document store and its facade.

use thiserror::Error;

/// Errors surfaced by the store client, the entity facade and change feeds.
#[derive(Debug, Error)]
pub enum DbError {
    /// A document presumed to exist is absent.
    #[error("{collection} document {id} not found")]
    NotFound { collection: String, id: String },

    /// A transactional precondition failed; nothing was written.
    #[error("{0}")]
    StaleWrite(String),

    /// An insert collided with an existing document id.
    #[error("{collection} document {id} already exists")]
    Duplicate { collection: String, id: String },

    /// A stored or delivered document could not be decoded into its entity type.
    #[error("failed to decode {collection} document: {source}")]
    Decode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    /// A change event carried a document that does not decode into its entity type.
    #[error("failed to decode {collection} change for {id}: {source}")]
    EventDecode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// An entity could not be encoded into a document.
    #[error("failed to encode {collection} document: {source}")]
    Encode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    /// The change feed dropped events because the subscriber fell behind.
    #[error("change feed for {collection} lagged by {skipped} events")]
    Lagged { collection: String, skipped: u64 },

    /// The store has been shut down.
    #[error("store is closed")]
    Closed,
}

impl DbError {
    pub(crate) fn not_found(collection: &str, id: impl ToString) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Builds a [`DbError::StaleWrite`] from any message.
    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleWrite(message.into())
    }

    /// Returns true for failures that reflect a rejected precondition rather than
    /// a broken store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::StaleWrite(_) | Self::Duplicate { .. } | Self::NotFound { .. }
        )
    }
}

/// Fails the surrounding transaction with [`DbError::StaleWrite`] unless `condition` holds.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), DbError> {
    if condition {
        Ok(())
    } else {
        Err(DbError::StaleWrite(message()))
    }
}
