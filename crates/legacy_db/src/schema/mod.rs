//! # Document Schema
//!
//! Every persisted entity type, together with the transactional operations
//! that keep references between them consistent. Operations are associated
//! functions taking a [`crate::Database`]; each one runs as a single
//! transaction and fails with [`crate::DbError::StaleWrite`] when a
//! precondition does not hold.
//!
//! ## Reference graph
//!
//! - [`Player`] points at its settlement and nation
//! - [`Settlement`] points at its leader and nation
//! - [`Nation`] points at its capital settlement
//! - [`NationRelation`] links two nations, one record per direction
//! - [`SettlementZone`] and [`SettlementRole`] belong to a settlement
//! - [`NationOutpost`] and [`Territory`] belong to a nation

mod economy;
mod nation;
mod outpost;
mod player;
mod relation;
mod role;
mod settlement;
mod space;
mod territory;
mod zone;

pub use economy::EcoStation;
pub use nation::{Nation, MAX_COLOR};
pub use outpost::{NationOutpost, TrustLevel};
pub use player::{Player, PlayerId};
pub use relation::{NationRelation, RelationLevel};
pub use role::{RolePermission, SettlementRole};
pub use settlement::{ForeignRelation, Settlement};
pub use space::{BlackHole, CelestialBody, CosmicBarrier, Planet, Star};
pub use territory::{Bastion, SiegePeriod, SiegeTime, Territory, Weekday};
pub use zone::SettlementZone;

/// Case-insensitive comparison key for user-facing names.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

pub(crate) fn same_name(a: &str, b: &str) -> bool {
    name_key(a) == name_key(b)
}
