use crate::collection::Database;
use crate::error::{ensure, DbError};
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::{same_name, Nation, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Who may build in an outpost without being trusted explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    #[default]
    Manual,
    Nation,
    Ally,
}

/// A circular claim owned by a nation, usually a space station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NationOutpost {
    #[serde(rename = "_id")]
    pub id: Oid<NationOutpost>,
    pub nation_id: Oid<Nation>,
    pub name: String,
    pub world_name: String,
    pub center_x: i32,
    pub center_z: i32,
    pub radius: i32,
    #[serde(default)]
    pub manager_ids: BTreeSet<PlayerId>,
    #[serde(default)]
    pub trusted_player_ids: BTreeSet<PlayerId>,
    #[serde(default)]
    pub trusted_nation_ids: BTreeSet<Oid<Nation>>,
    #[serde(default)]
    pub trust_level: TrustLevel,
}

impl DbObject for NationOutpost {
    const COLLECTION: &'static str = "nationoutpost";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl NationOutpost {
    pub fn create(
        db: &Database,
        nation: Oid<Nation>,
        name: &str,
        world: &str,
        x: i32,
        z: i32,
        radius: i32,
    ) -> Result<Oid<NationOutpost>, DbError> {
        ensure(radius > 0, || "Radius must be positive".to_string())?;
        db.trx(|tx| {
            ensure(tx.none::<NationOutpost>(|o| same_name(&o.name, name))?, || {
                format!("An outpost named {name} already exists")
            })?;
            ensure(tx.exists(nation)?, || "No such nation".to_string())?;
            tx.insert(&NationOutpost {
                id: Oid::new(),
                nation_id: nation,
                name: name.to_string(),
                world_name: world.to_string(),
                center_x: x,
                center_z: z,
                radius,
                manager_ids: BTreeSet::new(),
                trusted_player_ids: BTreeSet::new(),
                trusted_nation_ids: BTreeSet::new(),
                trust_level: TrustLevel::Manual,
            })
        })
    }

    pub fn set_radius(db: &Database, id: Oid<NationOutpost>, radius: i32) -> Result<(), DbError> {
        ensure(radius > 0, || "Radius must be positive".to_string())?;
        Self::modify(db, id, |o| o.radius = radius)
    }

    pub fn set_trust_level(db: &Database, id: Oid<NationOutpost>, level: TrustLevel) -> Result<(), DbError> {
        Self::modify(db, id, |o| o.trust_level = level)
    }

    pub fn trust_player(db: &Database, id: Oid<NationOutpost>, player: PlayerId) -> Result<(), DbError> {
        Self::modify(db, id, |o| {
            o.trusted_player_ids.insert(player);
        })
    }

    pub fn untrust_player(db: &Database, id: Oid<NationOutpost>, player: PlayerId) -> Result<(), DbError> {
        Self::modify(db, id, |o| {
            o.trusted_player_ids.remove(&player);
        })
    }

    pub fn trust_nation(db: &Database, id: Oid<NationOutpost>, nation: Oid<Nation>) -> Result<(), DbError> {
        Self::modify(db, id, |o| {
            o.trusted_nation_ids.insert(nation);
        })
    }

    pub fn untrust_nation(db: &Database, id: Oid<NationOutpost>, nation: Oid<Nation>) -> Result<(), DbError> {
        Self::modify(db, id, |o| {
            o.trusted_nation_ids.remove(&nation);
        })
    }

    pub fn add_manager(db: &Database, id: Oid<NationOutpost>, player: PlayerId) -> Result<(), DbError> {
        Self::modify(db, id, |o| {
            o.manager_ids.insert(player);
        })
    }

    pub fn remove_manager(db: &Database, id: Oid<NationOutpost>, player: PlayerId) -> Result<(), DbError> {
        Self::modify(db, id, |o| {
            o.manager_ids.remove(&player);
        })
    }

    pub fn delete(db: &Database, id: Oid<NationOutpost>) -> Result<bool, DbError> {
        db.collection::<NationOutpost>().delete(id)
    }

    fn modify(db: &Database, id: Oid<NationOutpost>, mutation: impl FnOnce(&mut NationOutpost)) -> Result<(), DbError> {
        db.collection::<NationOutpost>().update(id, mutation).map(|_| ())
    }
}
