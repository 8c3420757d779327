use legacy_cache::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("no region {0}")]
    UnknownRegion(String),

    /// A zone arrived before its settlement's region.
    #[error("zone {zone} belongs to settlement {settlement}, which has no region yet")]
    MissingParent { zone: String, settlement: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}
