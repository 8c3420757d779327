use crate::collection::{Database, Tx};
use crate::error::DbError;
use crate::object::DbObject;
use crate::oid::Oid;
use crate::schema::Nation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diplomatic stance, ordered from most hostile to closest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationLevel {
    Enemy,
    #[default]
    None,
    Neutral,
    Ally,
    Nation,
}

impl RelationLevel {
    pub const ALL: [RelationLevel; 5] = [
        RelationLevel::Enemy,
        RelationLevel::None,
        RelationLevel::Neutral,
        RelationLevel::Ally,
        RelationLevel::Nation,
    ];

    pub fn lowest(self, other: Self) -> Self {
        self.min(other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationLevel::Enemy => "ENEMY",
            RelationLevel::None => "NONE",
            RelationLevel::Neutral => "NEUTRAL",
            RelationLevel::Ally => "ALLY",
            RelationLevel::Nation => "NATION",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(text))
    }
}

impl fmt::Display for RelationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One direction of the relation between two nations.
///
/// `wish` is what `nation_id` wants; `actual` is the effective stance and is
/// always equal in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NationRelation {
    #[serde(rename = "_id")]
    pub id: Oid<NationRelation>,
    pub nation_id: Oid<Nation>,
    pub other_id: Oid<Nation>,
    pub wish: RelationLevel,
    pub actual: RelationLevel,
}

impl DbObject for NationRelation {
    const COLLECTION: &'static str = "nationrelation";

    fn id(&self) -> Oid<Self> {
        self.id
    }
}

impl NationRelation {
    pub fn get_wish(db: &Database, nation_id: Oid<Nation>, other_id: Oid<Nation>) -> Result<RelationLevel, DbError> {
        db.trx(|tx| Self::wish_in(tx, nation_id, other_id))
    }

    /// Sets `nation_id`'s wish toward `other_id` and recomputes the actual
    /// relation for both directions. Returns the new actual level.
    pub fn change_wish(
        db: &Database,
        nation_id: Oid<Nation>,
        other_id: Oid<Nation>,
        wish: RelationLevel,
    ) -> Result<RelationLevel, DbError> {
        crate::ensure(nation_id != other_id, || "A nation cannot change its relation with itself".to_string())?;
        db.trx(|tx| {
            let other_wish = Self::wish_in(tx, other_id, nation_id)?;
            let actual = wish.lowest(other_wish);
            Self::set(tx, nation_id, other_id, wish, actual)?;
            Self::set(tx, other_id, nation_id, other_wish, actual)?;
            Ok(actual)
        })
    }

    fn wish_in(tx: &Tx<'_>, nation_id: Oid<Nation>, other_id: Oid<Nation>) -> Result<RelationLevel, DbError> {
        if nation_id == other_id {
            return Ok(RelationLevel::Nation);
        }
        Ok(Self::find_in(tx, nation_id, other_id)?
            .map(|r| r.wish)
            .unwrap_or_default())
    }

    fn find_in(tx: &Tx<'_>, nation_id: Oid<Nation>, other_id: Oid<Nation>) -> Result<Option<NationRelation>, DbError> {
        Ok(tx
            .filter::<NationRelation>(|r| r.nation_id == nation_id && r.other_id == other_id)?
            .into_iter()
            .next())
    }

    fn set(
        tx: &mut Tx<'_>,
        nation_id: Oid<Nation>,
        other_id: Oid<Nation>,
        wish: RelationLevel,
        actual: RelationLevel,
    ) -> Result<(), DbError> {
        match Self::find_in(tx, nation_id, other_id)? {
            Some(mut existing) => {
                existing.wish = wish;
                existing.actual = actual;
                tx.save(&existing)
            }
            None => tx
                .insert(&NationRelation {
                    id: Oid::new(),
                    nation_id,
                    other_id,
                    wish,
                    actual,
                })
                .map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_rank() {
        assert!(RelationLevel::Enemy < RelationLevel::None);
        assert!(RelationLevel::None < RelationLevel::Neutral);
        assert!(RelationLevel::Neutral < RelationLevel::Ally);
        assert!(RelationLevel::Ally < RelationLevel::Nation);
        assert_eq!(RelationLevel::Ally.lowest(RelationLevel::None), RelationLevel::None);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(RelationLevel::parse("ally"), Some(RelationLevel::Ally));
        assert_eq!(RelationLevel::parse("bogus"), None);
        assert_eq!(
            serde_json::to_value(RelationLevel::Enemy).unwrap(),
            serde_json::json!("ENEMY")
        );
    }
}
