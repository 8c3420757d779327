//! The [`DbObject`] trait implemented by every persisted entity.

use crate::error::DbError;
use crate::oid::Oid;
use crate::store::{Document, ID_FIELD};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// A document type stored in its own collection.
///
/// Implementors serialise their id under [`ID_FIELD`], usually with
/// `#[serde(rename = "_id")]`. Entities are value snapshots: the cache hands
/// out shared, immutable copies and every change replaces a whole snapshot.
pub trait DbObject:
    Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static
{
    /// Collection name, the lowercase type name by convention.
    const COLLECTION: &'static str;

    fn id(&self) -> Oid<Self>;
}

pub(crate) fn encode<T: DbObject>(entity: &T) -> Result<Document, DbError> {
    let mut document = serde_json::to_value(entity).map_err(|source| DbError::Encode {
        collection: T::COLLECTION.to_string(),
        source,
    })?;
    if let Some(fields) = document.as_object_mut() {
        fields
            .entry(ID_FIELD)
            .or_insert_with(|| Document::String(entity.id().to_string()));
    }
    Ok(document)
}

pub(crate) fn decode<T: DbObject>(document: Document) -> Result<T, DbError> {
    serde_json::from_value(document).map_err(|source| DbError::Decode {
        collection: T::COLLECTION.to_string(),
        source,
    })
}

pub(crate) fn decode_event<T: DbObject>(id: Uuid, document: Document) -> Result<T, DbError> {
    serde_json::from_value(document).map_err(|source| DbError::EventDecode {
        collection: T::COLLECTION.to_string(),
        id: id.to_string(),
        source,
    })
}
