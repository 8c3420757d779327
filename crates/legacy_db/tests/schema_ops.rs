use legacy_db::geometry::chunk_key;
use legacy_db::schema::*;
use legacy_db::{ChangeKind, Database, DbError, MemoryStore, Oid, StoreClient, Vec3i};
use std::collections::BTreeSet;
use std::sync::Arc;

fn database() -> Database {
    Database::new(Arc::new(MemoryStore::new("schema-test")))
}

fn player(db: &Database, name: &str) -> PlayerId {
    let id = Oid::new();
    Player::register(db, id, name).unwrap();
    id
}

fn settlement(db: &Database, name: &str, leader: PlayerId, chunks: &[(i32, i32)]) -> Oid<Settlement> {
    let chunks = chunks.iter().map(|(x, z)| chunk_key(*x, *z)).collect();
    Settlement::create(db, "overworld", chunks, name, leader).unwrap()
}

#[test]
fn nation_creation_moves_capital_and_members() {
    let db = database();
    let leader = player(&db, "leader");
    let capital = settlement(&db, "Foo", leader, &[(0, 0)]);

    let nation = Nation::create(&db, "Empire", capital, 0x00ff00).unwrap();

    let players = db.collection::<Player>();
    assert_eq!(players.get(leader).unwrap().nation_id, Some(nation));
    assert_eq!(
        db.collection::<Settlement>().get(capital).unwrap().nation_id,
        Some(nation)
    );

    // name is taken case-insensitively and the capital is already in a nation
    let other = player(&db, "other");
    let second = settlement(&db, "Bar", other, &[(5, 5)]);
    let err = Nation::create(&db, "EMPIRE", second, 0).unwrap_err();
    assert!(matches!(err, DbError::StaleWrite(_)));
    let err = Nation::create(&db, "Other", capital, 0).unwrap_err();
    assert!(matches!(err, DbError::StaleWrite(_)));
}

#[test]
fn failed_precondition_changes_nothing() {
    let db = database();
    let store = db.client().clone();
    let leader = player(&db, "leader");
    let capital = settlement(&db, "Foo", leader, &[(0, 0)]);
    let before = store.find_all("player").unwrap();

    assert!(Nation::create(&db, "Empire", capital, 0x1_000_000).is_err());
    assert_eq!(store.find_all("player").unwrap(), before);
    assert!(store.find_all("nation").unwrap().is_empty());
}

#[test]
fn claims_cannot_overlap_in_one_world() {
    let db = database();
    let a = player(&db, "a");
    let b = player(&db, "b");
    let first = settlement(&db, "First", a, &[(0, 0)]);
    let second = settlement(&db, "Second", b, &[(3, 3)]);

    let overlap = BTreeSet::from([chunk_key(0, 0)]);
    assert!(matches!(
        Settlement::claim(&db, second, &overlap),
        Err(DbError::StaleWrite(_))
    ));

    Settlement::claim(&db, first, &BTreeSet::from([chunk_key(1, 0)])).unwrap();
    Settlement::unclaim(&db, first, &overlap).unwrap();
    Settlement::claim(&db, second, &overlap).unwrap();

    let settlements = db.collection::<Settlement>();
    assert_eq!(
        settlements.get(first).unwrap().chunks,
        BTreeSet::from([chunk_key(1, 0)])
    );
    assert!(settlements.get(second).unwrap().chunks.contains(&chunk_key(0, 0)));
}

#[test]
fn deleting_a_nation_clears_references() {
    let db = database();
    let a = player(&db, "a");
    let b = player(&db, "b");
    let capital = settlement(&db, "Capital", a, &[(0, 0)]);
    let rival_capital = settlement(&db, "Rival", b, &[(9, 9)]);
    let nation = Nation::create(&db, "Doomed", capital, 1).unwrap();
    let rival = Nation::create(&db, "Rival", rival_capital, 2).unwrap();

    NationRelation::change_wish(&db, nation, rival, RelationLevel::Ally).unwrap();
    let owned = NationOutpost::create(&db, nation, "Base", "space", 0, 0, 50).unwrap();
    let rival_outpost = NationOutpost::create(&db, rival, "Other", "space", 500, 0, 50).unwrap();
    NationOutpost::trust_nation(&db, rival_outpost, nation).unwrap();

    Nation::delete(&db, nation).unwrap();

    assert!(!db.collection::<Nation>().exists(nation).unwrap());
    assert!(!db.collection::<NationOutpost>().exists(owned).unwrap());
    assert!(db
        .collection::<NationOutpost>()
        .get(rival_outpost)
        .unwrap()
        .trusted_nation_ids
        .is_empty());
    assert!(db.collection::<NationRelation>().find_all().unwrap().is_empty());
    assert_eq!(db.collection::<Player>().get(a).unwrap().nation_id, None);
    assert_eq!(
        db.collection::<Settlement>().get(capital).unwrap().nation_id,
        None
    );
}

#[test]
fn settlement_join_and_leave_nation() {
    let db = database();
    let a = player(&db, "a");
    let b = player(&db, "b");
    let capital = settlement(&db, "Capital", a, &[(0, 0)]);
    let town = settlement(&db, "Town", b, &[(4, 4)]);
    let nation = Nation::create(&db, "Union", capital, 3).unwrap();

    Nation::add_invite(&db, nation, town).unwrap();
    Settlement::join_nation(&db, town, nation).unwrap();
    assert_eq!(db.collection::<Player>().get(b).unwrap().nation_id, Some(nation));
    assert!(!db.collection::<Nation>().get(nation).unwrap().is_invited(town));

    // the capital can neither leave nor be disbanded
    assert!(Settlement::leave_nation(&db, capital).is_err());
    assert!(Settlement::delete(&db, capital).is_err());

    assert!(Settlement::leave_nation(&db, town).unwrap());
    assert!(!Settlement::leave_nation(&db, town).unwrap());
    assert_eq!(db.collection::<Player>().get(b).unwrap().nation_id, None);
}

#[test]
fn settlement_delete_removes_zones_and_roles() {
    let db = database();
    let a = player(&db, "a");
    let town = settlement(&db, "Town", a, &[(0, 0)]);
    let zone = SettlementZone::create(&db, town, "Shop", Vec3i::new(0, 0, 0), Vec3i::new(5, 5, 5)).unwrap();
    let role = SettlementRole::create(&db, town, "Builder", BTreeSet::from([RolePermission::Build])).unwrap();
    SettlementRole::add_member(&db, role, a).unwrap();

    Settlement::delete(&db, town).unwrap();

    assert!(!db.collection::<SettlementZone>().exists(zone).unwrap());
    assert!(!db.collection::<SettlementRole>().exists(role).unwrap());
    assert_eq!(db.collection::<Player>().get(a).unwrap().settlement_id, None);
}

#[test]
fn relation_wishes_resolve_to_the_lower_level() {
    let db = database();
    let a_leader = player(&db, "a");
    let b_leader = player(&db, "b");
    let a = Nation::create(&db, "A", settlement(&db, "SA", a_leader, &[(0, 0)]), 1).unwrap();
    let b = Nation::create(&db, "B", settlement(&db, "SB", b_leader, &[(8, 8)]), 2).unwrap();

    assert_eq!(NationRelation::get_wish(&db, a, a).unwrap(), RelationLevel::Nation);
    assert_eq!(NationRelation::get_wish(&db, a, b).unwrap(), RelationLevel::None);

    let actual = NationRelation::change_wish(&db, a, b, RelationLevel::Ally).unwrap();
    assert_eq!(actual, RelationLevel::None);

    let actual = NationRelation::change_wish(&db, b, a, RelationLevel::Ally).unwrap();
    assert_eq!(actual, RelationLevel::Ally);

    let relations = db.collection::<NationRelation>().find_all().unwrap();
    assert_eq!(relations.len(), 2);
    assert!(relations.iter().all(|r| r.actual == RelationLevel::Ally));
    assert!(relations.iter().all(|r| r.wish == RelationLevel::Ally));

    let actual = NationRelation::change_wish(&db, a, b, RelationLevel::Enemy).unwrap();
    assert_eq!(actual, RelationLevel::Enemy);
    let relations = db.collection::<NationRelation>().find_all().unwrap();
    assert!(relations.iter().all(|r| r.actual == RelationLevel::Enemy));
}

#[tokio::test]
async fn one_change_event_per_touched_document() {
    let db = database();
    let leader = player(&db, "leader");
    let member = player(&db, "member");
    let capital = settlement(&db, "Foo", leader, &[(0, 0)]);
    db.collection::<Player>()
        .update(member, |p| p.settlement_id = Some(capital))
        .unwrap();

    let mut players = db.collection::<Player>().watch_updates().unwrap();
    let mut settlements = db.collection::<Settlement>().watch_updates().unwrap();
    let mut nations = db.collection::<Nation>().watch_inserts().unwrap();

    let nation = Nation::create(&db, "Empire", capital, 0).unwrap();

    let mut updated = vec![
        players.next().await.unwrap().unwrap().id,
        players.next().await.unwrap().unwrap().id,
    ];
    updated.sort();
    let mut expected = vec![leader, member];
    expected.sort();
    assert_eq!(updated, expected);

    let settlement_event = settlements.next().await.unwrap().unwrap();
    assert_eq!(settlement_event.kind, ChangeKind::Update);
    assert_eq!(settlement_event.document.unwrap().nation_id, Some(nation));
    assert_eq!(nations.next().await.unwrap().unwrap().id, nation);
}
