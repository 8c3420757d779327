use crate::collection::{Database, Tx};
use crate::error::{ensure, DbError};
use crate::geometry::ChunkKey;
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::{name_key, same_name, Nation, Player, PlayerId, SettlementRole, SettlementZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimum relationship an outsider needs to build on a settlement's land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignRelation {
    None,
    Ally,
    NationMember,
    #[default]
    SettlementMember,
    Strict,
}

impl ForeignRelation {
    pub const ALL: [ForeignRelation; 5] = [
        ForeignRelation::None,
        ForeignRelation::Ally,
        ForeignRelation::NationMember,
        ForeignRelation::SettlementMember,
        ForeignRelation::Strict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForeignRelation::None => "NONE",
            ForeignRelation::Ally => "ALLY",
            ForeignRelation::NationMember => "NATION_MEMBER",
            ForeignRelation::SettlementMember => "SETTLEMENT_MEMBER",
            ForeignRelation::Strict => "STRICT",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(text))
    }
}

/// A player-run town owning a set of chunks in one world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    #[serde(rename = "_id")]
    pub id: Oid<Settlement>,
    pub name: String,
    pub world_name: String,
    pub chunks: BTreeSet<ChunkKey>,
    pub leader_id: PlayerId,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub nation_id: Option<Oid<Nation>>,
    #[serde(default)]
    pub minimum_build_access: ForeignRelation,
    #[serde(default)]
    pub invites: BTreeSet<PlayerId>,
}

impl DbObject for Settlement {
    const COLLECTION: &'static str = "settlement";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl Settlement {
    /// Founds a settlement led by `leader`, who must not already belong to one.
    pub fn create(
        db: &Database,
        world: &str,
        chunks: BTreeSet<ChunkKey>,
        name: &str,
        leader: PlayerId,
    ) -> Result<Oid<Settlement>, DbError> {
        db.trx(|tx| {
            ensure(tx.none::<Settlement>(|s| same_name(&s.name, name))?, || {
                format!("A settlement named {name} already exists")
            })?;
            ensure(tx.matches(leader, |p: &Player| p.settlement_id.is_none())?, || {
                "The leader is already in a settlement".to_string()
            })?;
            Self::ensure_unclaimed(tx, None, world, &chunks)?;

            let settlement = Settlement {
                id: Oid::new(),
                name: name.to_string(),
                world_name: world.to_string(),
                chunks: chunks.clone(),
                leader_id: leader,
                balance: 0,
                nation_id: None,
                minimum_build_access: ForeignRelation::default(),
                invites: BTreeSet::new(),
            };
            tx.update(leader, |p: &mut Player| p.settlement_id = Some(settlement.id))?;
            tx.insert(&settlement)
        })
    }

    pub fn claim(db: &Database, id: Oid<Settlement>, chunks: &BTreeSet<ChunkKey>) -> Result<(), DbError> {
        db.trx(|tx| {
            let settlement = tx.get(id)?;
            Self::ensure_unclaimed(tx, Some(id), &settlement.world_name, chunks)?;
            tx.update(id, |s: &mut Settlement| s.chunks.extend(chunks.iter().copied()))
                .map(|_| ())
        })
    }

    pub fn unclaim(db: &Database, id: Oid<Settlement>, chunks: &BTreeSet<ChunkKey>) -> Result<(), DbError> {
        db.trx(|tx| {
            tx.update(id, |s: &mut Settlement| s.chunks.retain(|c| !chunks.contains(c)))
                .map(|_| ())
        })
    }

    /// Removes the settlement and every reference to it.
    pub fn delete(db: &Database, id: Oid<Settlement>) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(tx.exists(id)?, || "No such settlement".to_string())?;
            ensure(Self::capital_of(tx, id)?.is_none(), || {
                "The capital of a nation cannot be disbanded".to_string()
            })?;

            tx.update_many::<Player>(
                |p| p.settlement_id == Some(id),
                |p| {
                    p.settlement_id = None;
                    p.nation_id = None;
                },
            )?;
            tx.delete_many::<SettlementRole>(|r| r.parent == id)?;
            tx.delete_many::<SettlementZone>(|z| z.settlement_id == id)?;
            tx.update_many::<SettlementZone>(
                |z| z.trusted_settlements.as_ref().is_some_and(|t| t.contains(&id)),
                |z| {
                    if let Some(trusted) = z.trusted_settlements.as_mut() {
                        trusted.remove(&id);
                    }
                },
            )?;
            tx.update_many::<Nation>(|n| n.invites.contains(&id), |n| {
                n.invites.remove(&id);
            })?;
            tx.delete(id)?;
            Ok(())
        })
    }

    /// Takes the settlement out of its nation. Returns whether it was in one.
    pub fn leave_nation(db: &Database, id: Oid<Settlement>) -> Result<bool, DbError> {
        db.trx(|tx| {
            let settlement = tx.get(id)?;
            ensure(Self::capital_of(tx, id)?.is_none(), || {
                "The capital cannot leave its nation".to_string()
            })?;
            if settlement.nation_id.is_none() {
                return Ok(false);
            }
            tx.update_many::<Player>(|p| p.settlement_id == Some(id), |p| p.nation_id = None)?;
            tx.update(id, |s: &mut Settlement| s.nation_id = None)?;
            Ok(true)
        })
    }

    pub fn join_nation(db: &Database, id: Oid<Settlement>, nation_id: Oid<Nation>) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(tx.matches(id, |s: &Settlement| s.nation_id.is_none())?, || {
                "The settlement is missing or already in a nation".to_string()
            })?;
            ensure(tx.exists(nation_id)?, || "No such nation".to_string())?;

            tx.update_many::<Player>(|p| p.settlement_id == Some(id), |p| p.nation_id = Some(nation_id))?;
            tx.update(id, |s: &mut Settlement| s.nation_id = Some(nation_id))?;
            tx.update(nation_id, |n: &mut Nation| {
                n.invites.remove(&id);
            })?;
            Ok(())
        })
    }

    pub fn set_name(db: &Database, id: Oid<Settlement>, name: &str) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(tx.none::<Settlement>(|s| s.id != id && same_name(&s.name, name))?, || {
                format!("A settlement named {name} already exists")
            })?;
            tx.update(id, |s: &mut Settlement| s.name = name.to_string()).map(|_| ())
        })
    }

    pub fn set_leader(db: &Database, id: Oid<Settlement>, leader: PlayerId) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(tx.matches(leader, |p: &Player| p.settlement_id == Some(id))?, || {
                "The new leader must be a member of the settlement".to_string()
            })?;
            tx.update(id, |s: &mut Settlement| s.leader_id = leader).map(|_| ())
        })
    }

    pub fn set_min_build_access(db: &Database, id: Oid<Settlement>, level: ForeignRelation) -> Result<(), DbError> {
        db.collection::<Settlement>()
            .update(id, |s| s.minimum_build_access = level)
            .map(|_| ())
    }

    pub fn add_invite(db: &Database, id: Oid<Settlement>, player: PlayerId) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(!tx.matches(player, |p: &Player| p.settlement_id == Some(id))?, || {
                "That player is already a member".to_string()
            })?;
            ensure(!tx.matches(id, |s: &Settlement| s.invites.contains(&player))?, || {
                "That player is already invited".to_string()
            })?;
            tx.update(id, |s: &mut Settlement| {
                s.invites.insert(player);
            })
            .map(|_| ())
        })
    }

    pub fn remove_invite(db: &Database, id: Oid<Settlement>, player: PlayerId) -> Result<(), DbError> {
        db.trx(|tx| {
            ensure(tx.matches(id, |s: &Settlement| s.invites.contains(&player))?, || {
                "That player is not invited".to_string()
            })?;
            tx.update(id, |s: &mut Settlement| {
                s.invites.remove(&player);
            })
            .map(|_| ())
        })
    }

    pub fn deposit(db: &Database, id: Oid<Settlement>, amount: i64) -> Result<(), DbError> {
        ensure(amount >= 0, || "Amount must not be negative".to_string())?;
        db.collection::<Settlement>()
            .update(id, |s| s.balance += amount)
            .map(|_| ())
    }

    pub fn withdraw(db: &Database, id: Oid<Settlement>, amount: i64) -> Result<(), DbError> {
        ensure(amount >= 0, || "Amount must not be negative".to_string())?;
        db.trx(|tx| {
            ensure(tx.matches(id, |s: &Settlement| s.balance >= amount)?, || {
                "Insufficient settlement balance".to_string()
            })?;
            tx.update(id, |s: &mut Settlement| s.balance -= amount).map(|_| ())
        })
    }

    /// Lowercased name, the key used for case-insensitive lookups.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    fn capital_of(tx: &Tx<'_>, id: Oid<Settlement>) -> Result<Option<Oid<Nation>>, DbError> {
        Ok(tx
            .filter::<Nation>(|n| n.capital_id == id)?
            .first()
            .map(|n| n.id))
    }

    fn ensure_unclaimed(
        tx: &Tx<'_>,
        claimant: Option<Oid<Settlement>>,
        world: &str,
        chunks: &BTreeSet<ChunkKey>,
    ) -> Result<(), DbError> {
        let taken = tx.filter::<Settlement>(|s| {
            Some(s.id) != claimant && s.world_name == world && !s.chunks.is_disjoint(chunks)
        })?;
        ensure(taken.is_empty(), || {
            format!("Land already claimed by {}", taken[0].name)
        })
    }
}
