//! Celestial bodies placed in space worlds.
//!
//! Every body kind lives in its own collection but shares the
//! [`CelestialBody`] surface, which is what the space map and the generic
//! body cache work against.

use crate::collection::Database;
use crate::error::{ensure, DbError};
use crate::geometry::Vec3i;
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::same_name;
use serde::{Deserialize, Serialize};

/// Shared surface of stars, planets, black holes and barriers.
pub trait CelestialBody: DbObject {
    fn name(&self) -> &str;

    fn space_world(&self) -> &str;

    fn position(&self) -> Vec3i;

    fn move_to(&mut self, space_world: &str, position: Vec3i);

    fn set_pos(db: &Database, id: Oid<Self>, space_world: &str, position: Vec3i) -> Result<(), DbError> {
        db.collection::<Self>()
            .update(id, |body| body.move_to(space_world, position))
            .map(|_| ())
    }

    fn delete(db: &Database, id: Oid<Self>) -> Result<bool, DbError> {
        db.collection::<Self>().delete(id)
    }
}

fn insert_named<B: CelestialBody>(db: &Database, body: B) -> Result<Oid<B>, DbError> {
    db.trx(|tx| {
        ensure(tx.none::<B>(|b| same_name(b.name(), body.name()))?, || {
            format!("A {} named {} already exists", B::COLLECTION, body.name())
        })?;
        tx.insert(&body)
    })
}

macro_rules! body_position {
    () => {
        fn name(&self) -> &str {
            &self.name
        }

        fn space_world(&self) -> &str {
            &self.space_world
        }

        fn position(&self) -> Vec3i {
            Vec3i::new(self.x, self.y, self.z)
        }

        fn move_to(&mut self, space_world: &str, position: Vec3i) {
            self.space_world = space_world.to_string();
            self.x = position.x;
            self.y = position.y;
            self.z = position.z;
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Star {
    #[serde(rename = "_id")]
    pub id: Oid<Star>,
    pub name: String,
    pub space_world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub classification: String,
}

impl DbObject for Star {
    const COLLECTION: &'static str = "star";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl CelestialBody for Star {
    body_position!();
}

impl Star {
    pub fn create(db: &Database, name: &str, space_world: &str, at: Vec3i, classification: &str) -> Result<Oid<Star>, DbError> {
        insert_named(
            db,
            Star {
                id: Oid::new(),
                name: name.to_string(),
                space_world: space_world.to_string(),
                x: at.x,
                y: at.y,
                z: at.z,
                classification: classification.to_string(),
            },
        )
    }
}

/// A planet orbiting a star, with its own surface world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    #[serde(rename = "_id")]
    pub id: Oid<Planet>,
    pub name: String,
    #[serde(default)]
    pub sun_id: Option<Oid<Star>>,
    pub space_world: String,
    /// Name of the world players land on.
    pub planet_world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub size: i32,
}

impl DbObject for Planet {
    const COLLECTION: &'static str = "planet";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl CelestialBody for Planet {
    body_position!();
}

impl Planet {
    pub fn create(
        db: &Database,
        name: &str,
        sun: Option<Oid<Star>>,
        space_world: &str,
        planet_world: &str,
        at: Vec3i,
        size: i32,
    ) -> Result<Oid<Planet>, DbError> {
        insert_named(
            db,
            Planet {
                id: Oid::new(),
                name: name.to_string(),
                sun_id: sun,
                space_world: space_world.to_string(),
                planet_world: planet_world.to_string(),
                x: at.x,
                y: at.y,
                z: at.z,
                size,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackHole {
    #[serde(rename = "_id")]
    pub id: Oid<BlackHole>,
    pub name: String,
    pub space_world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub radius: i32,
}

impl DbObject for BlackHole {
    const COLLECTION: &'static str = "blackhole";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl CelestialBody for BlackHole {
    body_position!();
}

impl BlackHole {
    pub fn create(db: &Database, name: &str, space_world: &str, at: Vec3i, radius: i32) -> Result<Oid<BlackHole>, DbError> {
        insert_named(
            db,
            BlackHole {
                id: Oid::new(),
                name: name.to_string(),
                space_world: space_world.to_string(),
                x: at.x,
                y: at.y,
                z: at.z,
                radius,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmicBarrier {
    #[serde(rename = "_id")]
    pub id: Oid<CosmicBarrier>,
    pub name: String,
    pub space_world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub radius: i32,
}

impl DbObject for CosmicBarrier {
    const COLLECTION: &'static str = "cosmicbarrier";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl CelestialBody for CosmicBarrier {
    body_position!();
}

impl CosmicBarrier {
    pub fn create(
        db: &Database,
        name: &str,
        space_world: &str,
        at: Vec3i,
        radius: i32,
    ) -> Result<Oid<CosmicBarrier>, DbError> {
        insert_named(
            db,
            CosmicBarrier {
                id: Oid::new(),
                name: name.to_string(),
                space_world: space_world.to_string(),
                x: at.x,
                y: at.y,
                z: at.z,
                radius,
            },
        )
    }
}
