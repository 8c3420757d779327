use crate::collection::Database;
use crate::error::DbError;
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::{Nation, Settlement};
use serde::{Deserialize, Serialize};

pub type PlayerId = Oid<Player>;

/// A player's persistent membership data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "_id")]
    pub id: PlayerId,
    /// Last known username.
    pub last_known_name: String,
    pub settlement_id: Option<Oid<Settlement>>,
    pub nation_id: Option<Oid<Nation>>,
}

impl DbObject for Player {
    const COLLECTION: &'static str = "player";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            last_known_name: name.into(),
            settlement_id: None,
            nation_id: None,
        }
    }

    /// Records a player the first time they join, or refreshes their name.
    pub fn register(db: &Database, id: PlayerId, name: &str) -> Result<(), DbError> {
        db.trx(|tx| match tx.find::<Player>(id)? {
            Some(_) => tx.update(id, |p: &mut Player| p.last_known_name = name.to_string()).map(|_| ()),
            None => tx.insert(&Player::new(id, name)).map(|_| ()),
        })
    }
}
