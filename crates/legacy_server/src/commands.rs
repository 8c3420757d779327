//! Nation and settlement commands.
//!
//! Names and permissions are resolved against the replicated caches; writes
//! go through the entity store and run on the surface's [`CommandExecutor`].
//! Every outcome, success or failure, comes back as a sentence that can be
//! shown to the player who ran the command.

use crate::error::CommandError;
use crate::executor::CommandExecutor;
use legacy_cache::Caches;
use legacy_db::geometry::{chunk_key_x, chunk_key_z};
use legacy_db::schema::{Nation, NationRelation, PlayerId, RelationLevel, Settlement, MAX_COLOR};
use legacy_db::{Database, Location};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

const MAX_NAME_LENGTH: usize = 32;

/// The `/nation` and `/settlement` command surface.
pub struct NationCommands {
    db: Database,
    caches: Caches,
    executor: CommandExecutor,
}

impl NationCommands {
    pub fn new(db: Database, caches: Caches) -> Self {
        Self {
            db,
            caches,
            executor: CommandExecutor::new("NationCommands"),
        }
    }

    /// Founds a nation with the actor's settlement as its capital.
    pub async fn create_nation(&self, actor: PlayerId, name: &str, color: u32) -> Result<String, CommandError> {
        check_name(name)?;
        if color > MAX_COLOR {
            return Err(CommandError::invalid(format!("{color:#x} is not a valid color")));
        }
        let settlement = self.led_settlement(actor)?;
        if settlement.nation_id.is_some() {
            return Err(CommandError::invalid(format!("{} is already in a nation", settlement.name)));
        }
        if self.caches.nations.get_by_name(name).is_some() {
            return Err(CommandError::invalid(format!("A nation named {name} already exists")));
        }

        let db = self.db.clone();
        let capital = settlement.id;
        let owned = name.to_string();
        let id = self
            .executor
            .submit("create nation", move || Ok(Nation::create(&db, &owned, capital, color)?))
            .await?;

        info!("🏳️ Nation {} ({}) founded by settlement {}", name, id, settlement.name);
        Ok(format!("Created nation {name}"))
    }

    /// Changes the actor's nation's wish toward another nation. The actual
    /// relation is the lower of the two nations' wishes.
    pub async fn set_relation_wish(
        &self,
        actor: PlayerId,
        other_name: &str,
        wish: &str,
    ) -> Result<String, CommandError> {
        let nation = self.led_nation(actor)?;
        let other = self
            .caches
            .nations
            .get_by_name(other_name)
            .ok_or_else(|| CommandError::invalid(format!("No nation named {other_name}")))?;
        if other.id == nation.id {
            return Err(CommandError::invalid("A nation cannot change its relation with itself"));
        }
        let wish = RelationLevel::parse(wish).ok_or_else(|| {
            let levels: Vec<&str> = RelationLevel::ALL.iter().map(|level| level.as_str()).collect();
            CommandError::invalid(format!("Unknown relation {wish}, expected one of {}", levels.join(", ")))
        })?;

        let db = self.db.clone();
        let (ours, theirs) = (nation.id, other.id);
        let actual = self
            .executor
            .submit("change relation wish", move || {
                Ok(NationRelation::change_wish(&db, ours, theirs, wish)?)
            })
            .await?;

        Ok(format!(
            "Your wish toward {} is now {}. Your relation is {}.",
            other.name, wish, actual
        ))
    }

    /// Adds the chunk containing `location` to the actor's settlement.
    pub async fn claim_chunk(&self, actor: PlayerId, location: &Location) -> Result<String, CommandError> {
        let settlement = self.led_settlement(actor)?;
        if settlement.world_name != location.world.as_str() {
            return Err(CommandError::invalid(format!(
                "{} can only claim land in {}",
                settlement.name, settlement.world_name
            )));
        }
        let chunk = location.chunk_key();
        if settlement.chunks.contains(&chunk) {
            return Err(CommandError::invalid(format!("{} already owns this chunk", settlement.name)));
        }

        let db = self.db.clone();
        let id = settlement.id;
        self.executor
            .submit("claim chunk", move || Ok(Settlement::claim(&db, id, &BTreeSet::from([chunk]))?))
            .await?;

        Ok(format!(
            "Claimed chunk ({}, {}) for {}",
            chunk_key_x(chunk),
            chunk_key_z(chunk),
            settlement.name
        ))
    }

    /// Moves the actor's settlement into a nation that invited it.
    pub async fn join_nation(&self, actor: PlayerId, nation_name: &str) -> Result<String, CommandError> {
        let settlement = self.led_settlement(actor)?;
        if settlement.nation_id.is_some() {
            return Err(CommandError::invalid(format!("{} is already in a nation", settlement.name)));
        }
        let nation = self
            .caches
            .nations
            .get_by_name(nation_name)
            .ok_or_else(|| CommandError::invalid(format!("No nation named {nation_name}")))?;
        if !nation.is_invited(settlement.id) {
            return Err(CommandError::invalid(format!(
                "{} has not invited {}",
                nation.name, settlement.name
            )));
        }

        let db = self.db.clone();
        let (id, nation_id) = (settlement.id, nation.id);
        self.executor
            .submit("join nation", move || Ok(Settlement::join_nation(&db, id, nation_id)?))
            .await?;

        Ok(format!("{} joined {}", settlement.name, nation.name))
    }

    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
    }

    fn led_settlement(&self, actor: PlayerId) -> Result<Arc<Settlement>, CommandError> {
        let player = self
            .caches
            .players
            .try_get(actor)
            .ok_or_else(|| CommandError::invalid("You are not known to this server yet"))?;
        let settlement = player
            .settlement_id
            .and_then(|id| self.caches.settlements.try_get(id))
            .ok_or_else(|| CommandError::invalid("You are not in a settlement"))?;
        if settlement.leader_id != actor {
            return Err(CommandError::invalid(format!("Only the leader of {} can do that", settlement.name)));
        }
        Ok(settlement)
    }

    /// The nation whose capital the actor leads.
    fn led_nation(&self, actor: PlayerId) -> Result<Arc<Nation>, CommandError> {
        let settlement = self.led_settlement(actor)?;
        let nation = settlement
            .nation_id
            .and_then(|id| self.caches.nations.try_get(id))
            .ok_or_else(|| CommandError::invalid(format!("{} is not in a nation", settlement.name)))?;
        if nation.capital_id != settlement.id {
            return Err(CommandError::invalid(format!("Only the leader of {} can do that", nation.name)));
        }
        Ok(nation)
    }
}

fn check_name(name: &str) -> Result<(), CommandError> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(CommandError::invalid(format!(
            "Names must be between 1 and {MAX_NAME_LENGTH} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CommandError::invalid("Names may only contain letters, digits and underscores"));
    }
    Ok(())
}
