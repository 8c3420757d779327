use crate::collection::Database;
use crate::error::{ensure, DbError};
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::{
    name_key, same_name, NationOutpost, NationRelation, Player, Settlement, SettlementZone, Territory,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest valid packed RGB colour.
pub const MAX_COLOR: u32 = 0x00FF_FFFF;

/// A group of settlements led from a capital settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nation {
    #[serde(rename = "_id")]
    pub id: Oid<Nation>,
    pub name: String,
    /// The capital also determines the nation's leader.
    pub capital_id: Oid<Settlement>,
    /// Packed RGB used on the map.
    pub color: u32,
    #[serde(default)]
    pub balance: i64,
    /// Settlements invited to join.
    #[serde(default)]
    pub invites: BTreeSet<Oid<Settlement>>,
}

impl DbObject for Nation {
    const COLLECTION: &'static str = "nation";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl Nation {
    /// Founds a nation around `capital`, which must not already be in one.
    /// The capital and all of its members join the new nation.
    pub fn create(db: &Database, name: &str, capital: Oid<Settlement>, color: u32) -> Result<Oid<Nation>, DbError> {
        ensure(color <= MAX_COLOR, || format!("Invalid color {color:#x}"))?;
        db.trx(|tx| {
            ensure(tx.none::<Nation>(|n| same_name(&n.name, name))?, || {
                format!("A nation named {name} already exists")
            })?;
            ensure(tx.matches(capital, |s: &Settlement| s.nation_id.is_none())?, || {
                "The settlement is missing or already in a nation".to_string()
            })?;

            let nation = Nation {
                id: Oid::new(),
                name: name.to_string(),
                capital_id: capital,
                color,
                balance: 0,
                invites: BTreeSet::new(),
            };
            tx.update_many::<Player>(|p| p.settlement_id == Some(capital), |p| p.nation_id = Some(nation.id))?;
            tx.update(capital, |s: &mut Settlement| s.nation_id = Some(nation.id))?;
            tx.insert(&nation)
        })
    }

    /// Disbands the nation and clears every reference to it.
    pub fn delete(db: &Database, id: Oid<Nation>) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(tx.exists(id)?, || "No such nation".to_string())?;

            tx.update_many::<Territory>(
                |t| t.nation_id == Some(id),
                |t| {
                    t.nation_id = None;
                    for bastion in &mut t.bastions {
                        bastion.occupier_id = None;
                    }
                },
            )?;
            tx.update_many::<SettlementZone>(
                |z| z.trusted_nations.as_ref().is_some_and(|t| t.contains(&id)),
                |z| {
                    if let Some(trusted) = z.trusted_nations.as_mut() {
                        trusted.remove(&id);
                    }
                },
            )?;
            tx.update_many::<Settlement>(|s| s.nation_id == Some(id), |s| s.nation_id = None)?;
            tx.delete_many::<NationRelation>(|r| r.nation_id == id || r.other_id == id)?;
            tx.update_many::<Player>(|p| p.nation_id == Some(id), |p| p.nation_id = None)?;
            tx.update_many::<NationOutpost>(
                |o| o.nation_id != id && o.trusted_nation_ids.contains(&id),
                |o| {
                    o.trusted_nation_ids.remove(&id);
                },
            )?;
            tx.delete_many::<NationOutpost>(|o| o.nation_id == id)?;
            tx.delete(id)?;
            Ok(())
        })
    }

    pub fn set_name(db: &Database, id: Oid<Nation>, name: &str) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(tx.none::<Nation>(|n| n.id != id && same_name(&n.name, name))?, || {
                "A different nation with that name already exists".to_string()
            })?;
            tx.update(id, |n: &mut Nation| n.name = name.to_string()).map(|_| ())
        })
    }

    pub fn set_color(db: &Database, id: Oid<Nation>, color: u32) -> Result<(), DbError> {
        ensure(color <= MAX_COLOR, || format!("Invalid color {color:#x}"))?;
        db.collection::<Nation>().update(id, |n| n.color = color).map(|_| ())
    }

    pub fn set_capital(db: &Database, id: Oid<Nation>, capital: Oid<Settlement>) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(tx.matches(capital, |s: &Settlement| s.nation_id == Some(id))?, || {
                "Settlement not in nation".to_string()
            })?;
            ensure(tx.matches(id, |n: &Nation| n.capital_id != capital)?, || {
                "Settlement is already the capital".to_string()
            })?;
            tx.update(id, |n: &mut Nation| n.capital_id = capital).map(|_| ())
        })
    }

    pub fn add_invite(db: &Database, id: Oid<Nation>, settlement: Oid<Settlement>) -> Result<(), DbError> {
        db.collection::<Nation>()
            .update(id, |n| {
                n.invites.insert(settlement);
            })
            .map(|_| ())
    }

    pub fn remove_invite(db: &Database, id: Oid<Nation>, settlement: Oid<Settlement>) -> Result<(), DbError> {
        db.collection::<Nation>()
            .update(id, |n| {
                n.invites.remove(&settlement);
            })
            .map(|_| ())
    }

    pub fn is_invited(&self, settlement: Oid<Settlement>) -> bool {
        self.invites.contains(&settlement)
    }

    pub fn deposit(db: &Database, id: Oid<Nation>, amount: i64) -> Result<(), DbError> {
        ensure(amount >= 0, || "Amount must not be negative".to_string())?;
        db.collection::<Nation>().update(id, |n| n.balance += amount).map(|_| ())
    }

    pub fn withdraw(db: &Database, id: Oid<Nation>, amount: i64) -> Result<(), DbError> {
        ensure(amount >= 0, || "Amount must not be negative".to_string())?;
        db.trx(|tx| {
            ensure(tx.matches(id, |n: &Nation| n.balance >= amount)?, || {
                "Insufficient nation balance".to_string()
            })?;
            tx.update(id, |n: &mut Nation| n.balance -= amount).map(|_| ())
        })
    }

    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}
