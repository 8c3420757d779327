use crate::collection::Database;
use crate::error::{ensure, DbError};
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::same_name;
use serde::{Deserialize, Serialize};

/// A trading post players sell collected goods to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcoStation {
    #[serde(rename = "_id")]
    pub id: Oid<EcoStation>,
    pub name: String,
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl DbObject for EcoStation {
    const COLLECTION: &'static str = "ecostation";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl EcoStation {
    pub fn create(db: &Database, name: &str, world: &str, x: i32, z: i32) -> Result<Oid<EcoStation>, DbError> {
        db.trx(|tx| {
            ensure(tx.none::<EcoStation>(|s| same_name(&s.name, name))?, || {
                format!("An eco station named {name} already exists")
            })?;
            tx.insert(&EcoStation {
                id: Oid::new(),
                name: name.to_string(),
                world: world.to_string(),
                x,
                z,
            })
        })
    }

    pub fn delete(db: &Database, id: Oid<EcoStation>) -> Result<bool, DbError> {
        db.collection::<EcoStation>().delete(id)
    }
}
