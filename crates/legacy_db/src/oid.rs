//! # Typed Object Identifiers
//!
//! [`Oid<T>`] is the identifier every persisted document carries. It wraps a
//! time-ordered UUID (v7), so identifiers sort by creation time, and carries a
//! phantom entity type so that an `Oid<Nation>` can never be passed where an
//! `Oid<Settlement>` is expected.
//!
//! Equality, ordering and hashing only look at the underlying value. Two ids of
//! different entity types are simply different Rust types; converting between
//! them requires an explicit [`Oid::cast`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a persisted document of type `T`.
///
/// # Examples
///
/// ```rust
/// use legacy_db::Oid;
///
/// struct Nation;
///
/// let first: Oid<Nation> = Oid::new();
/// let second: Oid<Nation> = Oid::new();
/// assert!(first < second);
///
/// let parsed: Oid<Nation> = first.to_string().parse()?;
/// assert_eq!(first, parsed);
/// # Ok::<(), uuid::Error>(())
/// ```
pub struct Oid<T: ?Sized> {
    raw: Uuid,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized> Oid<T> {
    /// Generates a fresh, time-ordered identifier.
    pub fn new() -> Self {
        Self::from_raw(Uuid::now_v7())
    }

    /// Wraps an existing raw value.
    pub const fn from_raw(raw: Uuid) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// The underlying value, as stored in documents and change events.
    pub const fn raw(&self) -> Uuid {
        self.raw
    }

    /// Reinterprets this id as an id of another entity type.
    ///
    /// Only needed where one collection legitimately references documents of
    /// a related type by the same key.
    pub const fn cast<U: ?Sized>(self) -> Oid<U> {
        Oid::from_raw(self.raw)
    }
}

impl<T: ?Sized> Default for Oid<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Oid<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Oid<T> {}

impl<T: ?Sized> PartialEq for Oid<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: ?Sized> Eq for Oid<T> {}

impl<T: ?Sized> PartialOrd for Oid<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Oid<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: ?Sized> Hash for Oid<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Oid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.raw)
    }
}

impl<T: ?Sized> fmt::Display for Oid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<T: ?Sized> FromStr for Oid<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self::from_raw)
    }
}

impl<T: ?Sized> From<Oid<T>> for Uuid {
    fn from(id: Oid<T>) -> Self {
        id.raw
    }
}

impl<T: ?Sized> Serialize for Oid<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de, T: ?Sized> Deserialize<'de> for Oid<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(Self::from_raw)
    }
}
