use crate::collection::Database;
use crate::error::{ensure, DbError};
use crate::geometry::Vec3i;
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::{name_key, same_name, Nation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Daily window in which a territory's bastions may be sieged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiegePeriod {
    Period1,
    Period2,
    Period3,
}

impl SiegePeriod {
    pub fn text(&self) -> &'static str {
        match self {
            SiegePeriod::Period1 => "12:00 until 15:00",
            SiegePeriod::Period2 => "15:00 until 18:00",
            SiegePeriod::Period3 => "18:00 until 21:00",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiegeTime {
    pub day_of_week: Weekday,
    pub period: SiegePeriod,
}

/// A capturable point inside a territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bastion {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub occupier_id: Option<Oid<Nation>>,
}

impl Bastion {
    pub fn position(&self) -> Vec3i {
        Vec3i::new(self.x, self.y, self.z)
    }
}

/// A circular area nations compete over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    #[serde(rename = "_id")]
    pub id: Oid<Territory>,
    pub name: String,
    pub world_name: String,
    pub x: i32,
    pub z: i32,
    pub radius: i32,
    pub siege_schedule: SiegeTime,
    #[serde(default)]
    pub nation_id: Option<Oid<Nation>>,
    #[serde(default)]
    pub bastions: Vec<Bastion>,
}

impl DbObject for Territory {
    const COLLECTION: &'static str = "territory";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl Territory {
    pub fn create(
        db: &Database,
        name: &str,
        world: &str,
        x: i32,
        z: i32,
        radius: i32,
        siege_time: SiegeTime,
    ) -> Result<Oid<Territory>, DbError> {
        ensure(radius > 0, || "Radius must be positive".to_string())?;
        db.trx(|tx| {
            ensure(tx.none::<Territory>(|t| same_name(&t.name, name))?, || {
                format!("A territory named {name} already exists")
            })?;
            ensure(
                tx.none::<Territory>(|t| t.world_name == world && t.x == x && t.z == z)?,
                || format!("A territory is already centered at {x},{z} in {world}"),
            )?;
            tx.insert(&Territory {
                id: Oid::new(),
                name: name.to_string(),
                world_name: world.to_string(),
                x,
                z,
                radius,
                siege_schedule: siege_time,
                nation_id: None,
                bastions: Vec::new(),
            })
        })
    }

    pub fn set_nation(db: &Database, id: Oid<Territory>, nation: Option<Oid<Nation>>) -> Result<(), DbError> {
        db.trx(|tx| {
            if let Some(nation) = nation {
                ensure(tx.exists(nation)?, || "No such nation".to_string())?;
            }
            tx.update(id, |t: &mut Territory| t.nation_id = nation).map(|_| ())
        })
    }

    /// Stores a modified snapshot, for edits such as bastion captures.
    pub fn save(db: &Database, territory: &Territory) -> Result<(), DbError> {
        db.trx(|tx| tx.save(territory))
    }

    pub fn delete(db: &Database, id: Oid<Territory>) -> Result<bool, DbError> {
        db.collection::<Territory>().delete(id)
    }

    /// The bastion closest to `point`, if the territory has any.
    pub fn nearest_bastion(&self, point: Vec3i) -> Option<&Bastion> {
        self.bastions
            .iter()
            .min_by_key(|b| b.position().distance_squared(&point))
    }

    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}
