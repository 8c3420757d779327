use crate::collection::Database;
use crate::error::{ensure, DbError};
use crate::geometry::Vec3i;
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::{same_name, ForeignRelation, Nation, PlayerId, Settlement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A box inside a settlement that can be sold or rented to one player.
///
/// The trust sets are optional: `None` means the owner never configured
/// them, which is distinct from an empty set only for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementZone {
    #[serde(rename = "_id")]
    pub id: Oid<SettlementZone>,
    pub settlement_id: Oid<Settlement>,
    /// World of the parent settlement when the zone was created.
    pub world_name: String,
    pub name: String,
    pub min_point: Vec3i,
    pub max_point: Vec3i,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub rent: Option<i64>,
    #[serde(default)]
    pub owner: Option<PlayerId>,
    #[serde(default)]
    pub trusted_players: Option<BTreeSet<PlayerId>>,
    #[serde(default)]
    pub trusted_nations: Option<BTreeSet<Oid<Nation>>>,
    #[serde(default)]
    pub trusted_settlements: Option<BTreeSet<Oid<Settlement>>>,
    #[serde(default)]
    pub min_build_access: Option<ForeignRelation>,
}

impl DbObject for SettlementZone {
    const COLLECTION: &'static str = "settlementzone";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl SettlementZone {
    /// Creates a zone spanning the box between `a` and `b`, inclusive.
    pub fn create(
        db: &Database,
        settlement: Oid<Settlement>,
        name: &str,
        a: Vec3i,
        b: Vec3i,
    ) -> Result<Oid<SettlementZone>, DbError> {
        let (min_point, max_point) = Vec3i::bounds(a, b);
        db.trx(|tx| {
            let parent = tx.get(settlement)?;
            ensure(
                tx.none::<SettlementZone>(|z| z.settlement_id == settlement && same_name(&z.name, name))?,
                || format!("{} already has a zone named {name}", parent.name),
            )?;
            tx.insert(&SettlementZone {
                id: Oid::new(),
                settlement_id: settlement,
                world_name: parent.world_name.clone(),
                name: name.to_string(),
                min_point,
                max_point,
                price: None,
                rent: None,
                owner: None,
                trusted_players: None,
                trusted_nations: None,
                trusted_settlements: None,
                min_build_access: None,
            })
        })
    }

    pub fn set_owner(db: &Database, id: Oid<SettlementZone>, owner: Option<PlayerId>) -> Result<(), DbError> {
        Self::modify(db, id, |z| z.owner = owner)
    }

    pub fn set_price(db: &Database, id: Oid<SettlementZone>, price: Option<i64>) -> Result<(), DbError> {
        Self::modify(db, id, |z| z.price = price)
    }

    pub fn set_rent(db: &Database, id: Oid<SettlementZone>, rent: Option<i64>) -> Result<(), DbError> {
        Self::modify(db, id, |z| z.rent = rent)
    }

    pub fn set_min_build_access(
        db: &Database,
        id: Oid<SettlementZone>,
        level: Option<ForeignRelation>,
    ) -> Result<(), DbError> {
        Self::modify(db, id, |z| z.min_build_access = level)
    }

    pub fn trust_player(db: &Database, id: Oid<SettlementZone>, player: PlayerId) -> Result<(), DbError> {
        Self::modify(db, id, |z| {
            z.trusted_players.get_or_insert_with(BTreeSet::new).insert(player);
        })
    }

    pub fn untrust_player(db: &Database, id: Oid<SettlementZone>, player: PlayerId) -> Result<(), DbError> {
        Self::modify(db, id, |z| {
            if let Some(trusted) = z.trusted_players.as_mut() {
                trusted.remove(&player);
            }
        })
    }

    pub fn trust_nation(db: &Database, id: Oid<SettlementZone>, nation: Oid<Nation>) -> Result<(), DbError> {
        Self::modify(db, id, |z| {
            z.trusted_nations.get_or_insert_with(BTreeSet::new).insert(nation);
        })
    }

    pub fn untrust_nation(db: &Database, id: Oid<SettlementZone>, nation: Oid<Nation>) -> Result<(), DbError> {
        Self::modify(db, id, |z| {
            if let Some(trusted) = z.trusted_nations.as_mut() {
                trusted.remove(&nation);
            }
        })
    }

    pub fn trust_settlement(db: &Database, id: Oid<SettlementZone>, settlement: Oid<Settlement>) -> Result<(), DbError> {
        Self::modify(db, id, |z| {
            z.trusted_settlements.get_or_insert_with(BTreeSet::new).insert(settlement);
        })
    }

    pub fn untrust_settlement(
        db: &Database,
        id: Oid<SettlementZone>,
        settlement: Oid<Settlement>,
    ) -> Result<(), DbError> {
        Self::modify(db, id, |z| {
            if let Some(trusted) = z.trusted_settlements.as_mut() {
                trusted.remove(&settlement);
            }
        })
    }

    pub fn delete(db: &Database, id: Oid<SettlementZone>) -> Result<bool, DbError> {
        db.collection::<SettlementZone>().delete(id)
    }

    fn modify(db: &Database, id: Oid<SettlementZone>, mutation: impl FnOnce(&mut SettlementZone)) -> Result<(), DbError> {
        db.collection::<SettlementZone>().update(id, mutation).map(|_| ())
    }
}
