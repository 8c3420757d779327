use lib_legacy::config::AppConfig;
use lib_legacy::{CommandError, LegacyServer};
use legacy_db::geometry::chunk_key;
use legacy_db::schema::*;
use legacy_db::{Database, Location, Oid};
use legacy_regions::map::{Marker, NATIONS_SET};
use legacy_regions::MemoryMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn started() -> LegacyServer {
    let server = LegacyServer::new(&AppConfig::default());
    server.start().await.unwrap();
    server
}

/// Runs tick work until `check` holds.
async fn settle(server: &LegacyServer, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        server.tick_queue().run_pending();
        if check() {
            return;
        }
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn player(db: &Database, name: &str) -> PlayerId {
    let id = Oid::new();
    Player::register(db, id, name).unwrap();
    id
}

/// A settlement of one chunk at chunk `(x, 0)`, with its leader.
async fn settlement(server: &LegacyServer, name: &str, x: i32) -> (Oid<Settlement>, PlayerId) {
    let db = server.database();
    let leader = player(db, &format!("{name}_leader"));
    let id = Settlement::create(db, "overworld", BTreeSet::from([chunk_key(x, 0)]), name, leader).unwrap();
    settle(server, || {
        server.caches().settlements.contains(id)
            && server
                .caches()
                .players
                .try_get(leader)
                .is_some_and(|p| p.settlement_id == Some(id))
    })
    .await;
    (id, leader)
}

/// Founds a nation and waits until every cache involved has caught up.
async fn nation(server: &LegacyServer, leader: PlayerId, name: &str) -> Arc<Nation> {
    server.commands().create_nation(leader, name, 0x00AA00).await.unwrap();
    let caches = server.caches();
    settle(server, || {
        let Some(nation) = caches.nations.get_by_name(name) else { return false };
        caches.settlements.try_get(nation.capital_id).is_some_and(|s| s.nation_id == Some(nation.id))
            && caches.players.try_get(leader).is_some_and(|p| p.nation_id == Some(nation.id))
    })
    .await;
    caches.nations.get_by_name(name).unwrap()
}

fn markers(server: &LegacyServer) -> &MemoryMap {
    // the default configuration enables map sync
    server.markers().unwrap()
}

#[tokio::test]
async fn founding_a_nation_updates_caches_and_map() {
    let server = started().await;
    let (foo, leader) = settlement(&server, "Foo", 0).await;

    let message = server.commands().create_nation(leader, "Rome", 0xFF0000).await.unwrap();
    assert_eq!(message, "Created nation Rome");

    settle(&server, || {
        server
            .caches()
            .settlements
            .try_get(foo)
            .is_some_and(|s| s.nation_id.is_some())
    })
    .await;
    let rome = server.caches().nations.get_by_name("rome").unwrap();
    assert_eq!(rome.capital_id, foo);
    settle(&server, || {
        server
            .caches()
            .players
            .try_get(leader)
            .is_some_and(|p| p.nation_id == Some(rome.id))
    })
    .await;

    let marker_id = format!("settlement-{foo}");
    settle(&server, || {
        matches!(markers(&server).marker(NATIONS_SET, &marker_id), Some(Marker::Area(area)) if area.label == "Foo (Rome)")
    })
    .await;
}

#[tokio::test]
async fn founding_is_rejected_with_a_readable_reason() {
    let server = started().await;
    let (_, leader) = settlement(&server, "Foo", 0).await;
    let (bar, other_leader) = settlement(&server, "Bar", 5).await;
    nation(&server, leader, "Rome").await;

    let err = server.commands().create_nation(other_leader, "ROME", 0x123456).await.unwrap_err();
    assert!(matches!(err, CommandError::Invalid(_)));
    assert_eq!(err.to_string(), "A nation named ROME already exists");

    let err = server.commands().create_nation(leader, "Carthage", 0x123456).await.unwrap_err();
    assert_eq!(err.to_string(), "Foo is already in a nation");

    let err = server.commands().create_nation(other_leader, "Bad Name", 0x123456).await.unwrap_err();
    assert!(matches!(err, CommandError::Invalid(_)));

    let err = server.commands().create_nation(other_leader, "Carthage", 0x1000000).await.unwrap_err();
    assert!(matches!(err, CommandError::Invalid(_)));

    // a member who does not lead the settlement
    let member = player(server.database(), "Member");
    server
        .database()
        .collection::<Player>()
        .update(member, |p| p.settlement_id = Some(bar))
        .unwrap();
    settle(&server, || {
        server
            .caches()
            .players
            .try_get(member)
            .is_some_and(|p| p.settlement_id == Some(bar))
    })
    .await;
    let err = server.commands().create_nation(member, "Carthage", 0x123456).await.unwrap_err();
    assert_eq!(err.to_string(), "Only the leader of Bar can do that");

    let stranger = Oid::new();
    let err = server.commands().create_nation(stranger, "Carthage", 0x123456).await.unwrap_err();
    assert!(matches!(err, CommandError::Invalid(_)));
}

#[tokio::test]
async fn relation_wishes_resolve_to_the_lower_stance() {
    let server = started().await;
    let (_, rome_leader) = settlement(&server, "Foo", 0).await;
    let (bar, carthage_leader) = settlement(&server, "Bar", 5).await;
    let rome = nation(&server, rome_leader, "Rome").await;
    let carthage = nation(&server, carthage_leader, "Carthage").await;

    let message = server
        .commands()
        .set_relation_wish(rome_leader, "carthage", "ally")
        .await
        .unwrap();
    assert_eq!(message, "Your wish toward Carthage is now ALLY. Your relation is NONE.");

    let message = server
        .commands()
        .set_relation_wish(carthage_leader, "Rome", "Ally")
        .await
        .unwrap();
    assert_eq!(message, "Your wish toward Rome is now ALLY. Your relation is ALLY.");

    let message = server
        .commands()
        .set_relation_wish(carthage_leader, "Rome", "enemy")
        .await
        .unwrap();
    assert_eq!(message, "Your wish toward Rome is now ENEMY. Your relation is ENEMY.");

    let relations = &server.caches().relations;
    settle(&server, || {
        relations.relation(rome.id, carthage.id) == RelationLevel::Enemy
            && relations.relation(carthage.id, rome.id) == RelationLevel::Enemy
    })
    .await;
    assert_eq!(relations.wish(rome.id, carthage.id), RelationLevel::Ally);

    // Carthage's land is now hostile ground for Rome's leader
    let inside_bar = Location::new("overworld", 5 * 16 + 3, 64, 4);
    settle(&server, || {
        server.caches().settlements.try_get(bar).is_some_and(|s| s.nation_id == Some(carthage.id))
            && server.regions().is_hostile(rome_leader, &inside_bar)
    })
    .await;

    let err = server
        .commands()
        .set_relation_wish(rome_leader, "Carthage", "frenemy")
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Unknown relation frenemy"));

    let err = server
        .commands()
        .set_relation_wish(rome_leader, "Rome", "enemy")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "A nation cannot change its relation with itself");

    let err = server
        .commands()
        .set_relation_wish(rome_leader, "Atlantis", "enemy")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No nation named Atlantis");
}

#[tokio::test]
async fn claimed_chunks_become_part_of_the_settlement_region() {
    let server = started().await;
    let (foo, leader) = settlement(&server, "Foo", 0).await;
    let (_, other_leader) = settlement(&server, "Bar", 5).await;

    let target = Location::new("overworld", 2 * 16 + 1, 70, 8);
    let message = server.commands().claim_chunk(leader, &target).await.unwrap();
    assert_eq!(message, "Claimed chunk (2, 0) for Foo");

    settle(&server, || {
        server
            .regions()
            .find(&target)
            .first()
            .is_some_and(|region| region.read().key() == legacy_regions::RegionKey::Settlement(foo))
    })
    .await;
    assert!(server.regions().inaccess_message_at(leader, &target).is_none());
    assert_eq!(
        server.regions().inaccess_message_at(other_leader, &target).as_deref(),
        Some("This land is claimed by the settlement Foo")
    );

    // land owned by someone else is refused by the store
    let err = server.commands().claim_chunk(other_leader, &target).await.unwrap_err();
    assert!(matches!(err, CommandError::Invalid(_)));

    let err = server.commands().claim_chunk(leader, &target).await.unwrap_err();
    assert_eq!(err.to_string(), "Foo already owns this chunk");

    let elsewhere = Location::new("nether", 0, 64, 0);
    let err = server.commands().claim_chunk(leader, &elsewhere).await.unwrap_err();
    assert_eq!(err.to_string(), "Foo can only claim land in overworld");
}

#[tokio::test]
async fn settlements_join_nations_only_when_invited() {
    let server = started().await;
    let (_, rome_leader) = settlement(&server, "Foo", 0).await;
    let (bar, bar_leader) = settlement(&server, "Bar", 5).await;
    let rome = nation(&server, rome_leader, "Rome").await;

    let err = server.commands().join_nation(bar_leader, "Rome").await.unwrap_err();
    assert_eq!(err.to_string(), "Rome has not invited Bar");

    Nation::add_invite(server.database(), rome.id, bar).unwrap();
    settle(&server, || {
        server
            .caches()
            .nations
            .try_get(rome.id)
            .is_some_and(|n| n.is_invited(bar))
    })
    .await;

    let message = server.commands().join_nation(bar_leader, "rome").await.unwrap();
    assert_eq!(message, "Bar joined Rome");

    settle(&server, || {
        server.caches().settlements.try_get(bar).is_some_and(|s| s.nation_id == Some(rome.id))
            && server.caches().players.members_of_nation(rome.id).len() == 2
    })
    .await;

    let err = server.commands().join_nation(bar_leader, "Rome").await.unwrap_err();
    assert_eq!(err.to_string(), "Bar is already in a nation");
}

#[tokio::test]
async fn shutdown_closes_the_command_surface() {
    let server = started().await;
    let (_, leader) = settlement(&server, "Foo", 0).await;
    server.shutdown().await;

    let err = server.commands().create_nation(leader, "Rome", 0xFF0000).await.unwrap_err();
    assert!(matches!(err, CommandError::Closed));
}
