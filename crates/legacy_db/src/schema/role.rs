use crate::collection::Database;
use crate::error::{ensure, DbError};
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::{same_name, Player, PlayerId, Settlement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolePermission {
    Build,
    Invite,
    Kick,
    ManageZones,
    Withdraw,
}

/// A named permission group inside a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRole {
    #[serde(rename = "_id")]
    pub id: Oid<SettlementRole>,
    pub parent: Oid<Settlement>,
    pub name: String,
    #[serde(default)]
    pub members: BTreeSet<PlayerId>,
    #[serde(default)]
    pub permissions: BTreeSet<RolePermission>,
}

impl DbObject for SettlementRole {
    const COLLECTION: &'static str = "settlementrole";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl SettlementRole {
    pub fn create(
        db: &Database,
        parent: Oid<Settlement>,
        name: &str,
        permissions: BTreeSet<RolePermission>,
    ) -> Result<Oid<SettlementRole>, DbError> {
        db.trx(|tx| {
            ensure(tx.exists(parent)?, || "No such settlement".to_string())?;
            ensure(
                tx.none::<SettlementRole>(|r| r.parent == parent && same_name(&r.name, name))?,
                || format!("A role named {name} already exists"),
            )?;
            tx.insert(&SettlementRole {
                id: Oid::new(),
                parent,
                name: name.to_string(),
                members: BTreeSet::new(),
                permissions: permissions.clone(),
            })
        })
    }

    /// Adds a member of the role's settlement to the role.
    pub fn add_member(db: &Database, id: Oid<SettlementRole>, player: PlayerId) -> Result<(), DbError> {
        db.trx(|tx| {
            let role = tx.get(id)?;
            ensure(tx.matches(player, |p: &Player| p.settlement_id == Some(role.parent))?, || {
                "Only settlement members can hold its roles".to_string()
            })?;
            tx.update(id, |r: &mut SettlementRole| {
                r.members.insert(player);
            })
            .map(|_| ())
        })
    }

    pub fn remove_member(db: &Database, id: Oid<SettlementRole>, player: PlayerId) -> Result<(), DbError> {
        db.collection::<SettlementRole>()
            .update(id, |r| {
                r.members.remove(&player);
            })
            .map(|_| ())
    }

    pub fn delete(db: &Database, id: Oid<SettlementRole>) -> Result<bool, DbError> {
        db.collection::<SettlementRole>().delete(id)
    }

    pub fn grants(&self, permission: RolePermission) -> bool {
        self.permissions.contains(&permission)
    }
}
