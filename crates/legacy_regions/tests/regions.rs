use legacy_cache::{CacheError, CacheOptions, Caches, TickQueue};
use legacy_db::geometry::chunk_key;
use legacy_db::schema::*;
use legacy_db::{Database, Location, MemoryStore, Oid, Vec3i};
use legacy_regions::map::{Marker, NATIONS_SET, SPACE_SET};
use legacy_regions::{MemoryMap, NationsMap, RegionError, RegionKey, RegionKind, Regions, SpaceMap};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct World {
    db: Database,
    caches: Caches,
    tick: TickQueue,
    regions: Arc<Regions>,
}

impl World {
    async fn start(db: Database) -> World {
        let caches = Caches::new(&db, CacheOptions::default());
        let tick = TickQueue::new();
        let regions = Arc::new(Regions::new(caches.clone(), Duration::from_secs(5)));
        legacy_regions::sync::install(&regions, &tick);
        caches.load_all().await.unwrap();
        regions.load().unwrap();
        World {
            db,
            caches,
            tick,
            regions,
        }
    }

    async fn settle(&self, mut check: impl FnMut(&World) -> bool) {
        drain_until(&self.tick, || check(self)).await
    }

    fn kinds_at(&self, x: i32, z: i32) -> Vec<RegionKind> {
        self.regions
            .find(&at(x, z))
            .iter()
            .map(|region| region.read().kind())
            .collect()
    }

    fn denied(&self, player: PlayerId, x: i32, z: i32) -> Option<String> {
        self.regions.inaccess_message_at(player, &at(x, z))
    }
}

/// Drains the tick queue until `check` holds.
async fn drain_until(tick: &TickQueue, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        tick.run_pending();
        if check() {
            return;
        }
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn database() -> Database {
    Database::new(Arc::new(MemoryStore::new("region-test")))
}

fn at(x: i32, z: i32) -> Location {
    Location::new("overworld", x, 64, z)
}

fn player(db: &Database, name: &str) -> PlayerId {
    let id = Oid::new();
    Player::register(db, id, name).unwrap();
    id
}

fn settlement(db: &Database, name: &str, chunks: &[(i32, i32)]) -> (Oid<Settlement>, PlayerId) {
    let leader = player(db, &format!("{name}-leader"));
    let chunks = chunks.iter().map(|&(x, z)| chunk_key(x, z)).collect();
    let id = Settlement::create(db, "overworld", chunks, name, leader).unwrap();
    (id, leader)
}

fn join(db: &Database, player: PlayerId, settlement: Oid<Settlement>) {
    db.collection::<Player>()
        .update(player, |p| p.settlement_id = Some(settlement))
        .unwrap();
}

fn siege() -> SiegeTime {
    SiegeTime {
        day_of_week: Weekday::Saturday,
        period: SiegePeriod::Period2,
    }
}

#[tokio::test]
async fn settlements_are_found_by_claimed_chunk() {
    let db = database();
    let (foo, _) = settlement(&db, "Foo", &[(0, 0), (1, 0)]);
    let world = World::start(db).await;

    let found = world.regions.find(&at(5, 5));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].read().key(), RegionKey::Settlement(foo));
    assert_eq!(world.kinds_at(20, 3), vec![RegionKind::Settlement]);

    assert!(world.regions.find(&at(40, 0)).is_empty());
    assert!(world.regions.find(&Location::new("nether", 5, 64, 5)).is_empty());
}

#[tokio::test]
async fn claims_follow_the_feed() {
    let world = World::start(database()).await;
    let (foo, _) = settlement(&world.db, "Foo", &[(0, 0)]);
    world.settle(|w| w.kinds_at(0, 0) == vec![RegionKind::Settlement]).await;

    Settlement::claim(&world.db, foo, &BTreeSet::from([chunk_key(5, 0)])).unwrap();
    world.settle(|w| !w.kinds_at(80, 0).is_empty()).await;

    Settlement::unclaim(&world.db, foo, &BTreeSet::from([chunk_key(0, 0)])).unwrap();
    world.settle(|w| w.kinds_at(0, 0).is_empty()).await;
    assert_eq!(world.kinds_at(80, 0), vec![RegionKind::Settlement]);

    Settlement::delete(&world.db, foo).unwrap();
    world.settle(|w| w.regions.is_empty()).await;
    assert!(world.kinds_at(80, 0).is_empty());
}

#[tokio::test]
async fn updates_keep_region_identity() {
    let world = World::start(database()).await;
    let (foo, _) = settlement(&world.db, "Foo", &[(0, 0)]);
    let key = RegionKey::Settlement(foo);
    world.settle(|w| w.regions.try_get(key).is_some()).await;
    let handle = world.regions.get(key).unwrap();

    Settlement::set_name(&world.db, foo, "Renamed").unwrap();
    world.settle(|_| handle.read().name() == "Renamed").await;

    assert!(Arc::ptr_eq(&handle, &world.regions.get(key).unwrap()));
    assert_eq!(world.regions.len(), 1);
}

#[tokio::test]
async fn zones_come_before_their_settlement() {
    let world = World::start(database()).await;
    let (foo, _) = settlement(&world.db, "Foo", &[(0, 0)]);
    let zone = SettlementZone::create(&world.db, foo, "Market", Vec3i::new(0, 0, 0), Vec3i::new(7, 255, 7)).unwrap();
    world.settle(|w| w.kinds_at(3, 3).len() == 2).await;

    assert_eq!(world.kinds_at(3, 3), vec![RegionKind::SettlementZone, RegionKind::Settlement]);
    assert_eq!(world.kinds_at(10, 10), vec![RegionKind::Settlement]);
    assert_eq!(world.regions.children(foo).len(), 1);

    let first_settlement = world.regions.find_first_of(&at(3, 3), RegionKind::Settlement).unwrap();
    assert_eq!(first_settlement.read().key(), RegionKey::Settlement(foo));
    assert!(world.regions.find_first_of(&at(3, 3), RegionKind::Territory).is_none());

    SettlementZone::delete(&world.db, zone).unwrap();
    world.settle(|w| w.regions.children(foo).is_empty()).await;
    assert_eq!(world.kinds_at(3, 3), vec![RegionKind::Settlement]);
}

#[tokio::test]
async fn zones_wait_for_a_missing_parent() {
    let caches = Caches::new(&database(), CacheOptions::default());
    let regions = Regions::new(caches, Duration::from_secs(5));
    let leader = Oid::new();
    let settlement = Settlement {
        id: Oid::new(),
        name: "Late".to_string(),
        world_name: "overworld".to_string(),
        chunks: BTreeSet::from([chunk_key(0, 0)]),
        leader_id: leader,
        balance: 0,
        nation_id: None,
        minimum_build_access: ForeignRelation::SettlementMember,
        invites: BTreeSet::new(),
    };
    let zone = SettlementZone {
        id: Oid::new(),
        settlement_id: settlement.id,
        world_name: "overworld".to_string(),
        name: "Early".to_string(),
        min_point: Vec3i::new(0, 0, 0),
        max_point: Vec3i::new(3, 100, 3),
        price: None,
        rent: None,
        owner: None,
        trusted_players: None,
        trusted_nations: None,
        trusted_settlements: None,
        min_build_access: None,
    };

    regions.upsert(&zone);
    assert!(regions.find(&at(1, 1)).is_empty());

    regions.upsert(&settlement);
    let kinds: Vec<_> = regions.find(&at(1, 1)).iter().map(|r| r.read().kind()).collect();
    assert_eq!(kinds, vec![RegionKind::SettlementZone, RegionKind::Settlement]);
}

#[tokio::test]
async fn loading_requires_loaded_caches() {
    let caches = Caches::new(&database(), CacheOptions::default());
    let regions = Regions::new(caches, Duration::from_secs(5));
    assert!(matches!(regions.load(), Err(RegionError::Cache(CacheError::NotLoaded(_)))));
}

#[tokio::test]
async fn settlement_access_follows_membership_and_roles() {
    let world = World::start(database()).await;
    let db = &world.db;
    let (foo, leader) = settlement(db, "Foo", &[(0, 0)]);
    let member = player(db, "member");
    let stranger = player(db, "stranger");
    join(db, member, foo);
    world
        .settle(|w| w.caches.players.members_of_settlement(foo).len() == 2 && !w.regions.is_empty())
        .await;

    assert_eq!(world.denied(leader, 1, 1), None);
    assert_eq!(world.denied(member, 1, 1), None);
    assert_eq!(
        world.denied(stranger, 1, 1).as_deref(),
        Some("This land is claimed by the settlement Foo")
    );
    assert_eq!(world.denied(stranger, 100, 100), None);

    Settlement::set_min_build_access(db, foo, ForeignRelation::Strict).unwrap();
    world.settle(|w| w.denied(member, 1, 1).is_some()).await;
    assert_eq!(world.denied(leader, 1, 1), None);

    let builders = SettlementRole::create(db, foo, "Builders", BTreeSet::from([RolePermission::Build])).unwrap();
    SettlementRole::add_member(db, builders, member).unwrap();
    world.settle(|w| w.denied(member, 1, 1).is_none()).await;

    Settlement::set_min_build_access(db, foo, ForeignRelation::None).unwrap();
    world.settle(|w| w.denied(stranger, 1, 1).is_none()).await;
}

#[tokio::test]
async fn outposts_and_territories_use_nation_trust() {
    let world = World::start(database()).await;
    let db = &world.db;
    let (capital, citizen) = settlement(db, "Capital", &[(50, 50)]);
    let (other_capital, foreigner) = settlement(db, "Elsewhere", &[(60, 60)]);
    let stranger = player(db, "stranger");
    let empire = Nation::create(db, "Empire", capital, 0x3355ff).unwrap();
    let league = Nation::create(db, "League", other_capital, 0x33ff55).unwrap();
    let port = NationOutpost::create(db, empire, "Port", "overworld", 0, 0, 100).unwrap();
    let ridge = Territory::create(db, "Ridge", "overworld", 500, 0, 50, siege()).unwrap();
    world
        .settle(|w| {
            w.caches.players.members_of_nation(empire).len() == 1
                && w.caches.players.members_of_nation(league).len() == 1
                && w.regions.len() == 4
        })
        .await;

    // manual trust: nobody but managers and trusted players
    assert_eq!(
        world.denied(citizen, 10, 10).as_deref(),
        Some("Space station Port is claimed by Empire @ 0,0 x 100")
    );
    NationOutpost::set_trust_level(db, port, TrustLevel::Nation).unwrap();
    world.settle(|w| w.denied(citizen, 10, 10).is_none()).await;
    assert!(world.denied(foreigner, 10, 10).is_some());
    NationOutpost::trust_player(db, port, stranger).unwrap();
    world.settle(|w| w.denied(stranger, 10, 10).is_none()).await;
    assert_eq!(world.denied(citizen, 101, 0), None);

    assert_eq!(
        world.denied(citizen, 500, 0).as_deref(),
        Some("Ridge is not claimed by any nation!")
    );
    Territory::set_nation(db, ridge, Some(empire)).unwrap();
    world.settle(|w| w.denied(citizen, 500, 0).is_none()).await;
    assert_eq!(
        world.denied(foreigner, 500, 0).as_deref(),
        Some("Ridge is a territory claimed by Empire")
    );

    NationRelation::change_wish(db, empire, league, RelationLevel::Ally).unwrap();
    NationRelation::change_wish(db, league, empire, RelationLevel::Ally).unwrap();
    world.settle(|w| w.denied(foreigner, 500, 0).is_none()).await;
    assert!(world.denied(stranger, 500, 0).is_some());
}

#[tokio::test]
async fn zone_access_uses_owner_and_trust() {
    let world = World::start(database()).await;
    let db = &world.db;
    let (foo, leader) = settlement(db, "Foo", &[(0, 0)]);
    let renter = player(db, "renter");
    let friend = player(db, "friend");
    let zone = SettlementZone::create(db, foo, "Shop", Vec3i::new(0, 0, 0), Vec3i::new(7, 255, 7)).unwrap();
    world.settle(|w| w.kinds_at(1, 1).len() == 2).await;

    assert_eq!(
        world.denied(leader, 1, 1).as_deref(),
        Some("This is the settlement zone Shop, and it's unclaimed")
    );

    SettlementZone::set_owner(db, zone, Some(renter)).unwrap();
    world.settle(|w| w.denied(renter, 1, 1).is_none()).await;
    assert_eq!(
        world.denied(friend, 1, 1).as_deref(),
        Some("This is part of the settlement zone Shop")
    );

    SettlementZone::trust_player(db, zone, friend).unwrap();
    world.settle(|w| w.denied(friend, 1, 1).is_none()).await;

    // outside the zone the settlement decides
    assert_eq!(world.denied(leader, 10, 10), None);
}

#[tokio::test]
async fn hostility_follows_relations() {
    let world = World::start(database()).await;
    let db = &world.db;
    let (capital, citizen) = settlement(db, "Capital", &[(0, 0)]);
    let (other_capital, foreigner) = settlement(db, "Elsewhere", &[(60, 60)]);
    let drifter = player(db, "drifter");
    let empire = Nation::create(db, "Empire", capital, 0).unwrap();
    let league = Nation::create(db, "League", other_capital, 0).unwrap();
    NationOutpost::create(db, empire, "Port", "overworld", 2000, 0, 100).unwrap();
    let ridge = Territory::create(db, "Ridge", "overworld", 500, 0, 50, siege()).unwrap();
    world
        .settle(|w| {
            w.caches.players.members_of_nation(league).len() == 1
                && w.caches.settlements.in_nation(empire).len() == 1
                && w.regions.len() == 4
        })
        .await;

    assert!(!world.regions.is_hostile(foreigner, &at(1, 1)));
    assert!(!world.regions.is_hostile(drifter, &at(1, 1)));

    NationRelation::change_wish(db, empire, league, RelationLevel::Enemy).unwrap();
    world.settle(|w| w.regions.is_hostile(foreigner, &at(1, 1))).await;
    assert!(!world.regions.is_hostile(citizen, &at(1, 1)));
    assert!(world.regions.is_hostile(foreigner, &at(2000, 50)));
    assert!(!world.regions.is_hostile(drifter, &at(2000, 50)));
    assert!(!world.regions.is_hostile(foreigner, &at(3000, 0)));

    let mut territory = db.collection::<Territory>().get(ridge).unwrap();
    territory.bastions.push(Bastion {
        name: "Gate".to_string(),
        x: 510,
        y: 64,
        z: 0,
        occupier_id: Some(empire),
    });
    Territory::save(db, &territory).unwrap();
    world
        .settle(|w| {
            w.caches
                .territories
                .try_get(ridge)
                .is_some_and(|t| !t.bastions.is_empty())
        })
        .await;

    assert!(world.regions.is_hostile(foreigner, &at(505, 0)));
    assert!(!world.regions.is_hostile(citizen, &at(505, 0)));
}

#[tokio::test]
async fn deleting_a_region_clears_its_cooldowns() {
    let world = World::start(database()).await;
    let ridge = Territory::create(&world.db, "Ridge", "overworld", 0, 0, 50, siege()).unwrap();
    let key = RegionKey::Territory(ridge);
    world.settle(|w| w.regions.try_get(key).is_some()).await;

    let someone = Oid::new();
    assert!(world.regions.on_failed_access(someone, key));
    assert!(!world.regions.on_failed_access(someone, key));
    assert_eq!(world.regions.cooldown_entries(), 1);

    Territory::delete(&world.db, ridge).unwrap();
    world.settle(|w| w.regions.try_get(key).is_none()).await;
    assert_eq!(world.regions.cooldown_entries(), 0);
    assert!(world.regions.find(&at(0, 0)).is_empty());
}

#[tokio::test]
async fn overlapping_regions_have_a_stable_order() {
    let world = World::start(database()).await;
    for (offset, name) in ["North", "South", "East"].into_iter().enumerate() {
        Territory::create(&world.db, name, "overworld", offset as i32, 0, 100, siege()).unwrap();
    }
    world.settle(|w| w.regions.find(&at(0, 0)).len() == 3).await;

    let ids: Vec<_> = world.regions.find(&at(0, 0)).iter().map(|r| r.read().key().raw()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn nations_map_follows_claims_and_owners() {
    let db = database();
    let caches = Caches::new(&db, CacheOptions::default());
    let tick = TickQueue::new();
    let backend = Arc::new(MemoryMap::new());
    let map = NationsMap::new(caches.clone(), backend.clone(), tick.clone());
    map.install();
    caches.load_all().await.unwrap();
    map.refresh();
    let label = |id: &str| backend.marker(NATIONS_SET, id).map(|m| m.label().to_string());

    let (foo, _) = settlement(&db, "Foo", &[(0, 0)]);
    let marker = format!("settlement-{}", foo);
    drain_until(&tick, || label(&marker).as_deref() == Some("Foo")).await;

    let empire = Nation::create(&db, "Empire", foo, 0x3355ff).unwrap();
    drain_until(&tick, || label(&marker).as_deref() == Some("Foo (Empire)")).await;
    match backend.marker(NATIONS_SET, &marker) {
        Some(Marker::Area(area)) => assert_eq!(area.style.fill_color, 0x3355ff),
        other => panic!("unexpected marker {other:?}"),
    }

    let ridge = Territory::create(&db, "Ridge", "overworld", 500, 0, 50, siege()).unwrap();
    let mut territory = Territory {
        nation_id: Some(empire),
        ..db.collection::<Territory>().get(ridge).unwrap()
    };
    territory.bastions = vec![
        Bastion {
            name: "Keep".to_string(),
            x: 510,
            y: 64,
            z: 0,
            occupier_id: Some(empire),
        },
        Bastion {
            name: "Gate".to_string(),
            x: 490,
            y: 64,
            z: 0,
            occupier_id: None,
        },
    ];
    Territory::save(&db, &territory).unwrap();

    let keep = format!("bastion-{}-Keep", ridge);
    let gate = format!("bastion-{}-Gate", ridge);
    drain_until(&tick, || backend.marker(NATIONS_SET, &gate).is_some()).await;
    match backend.marker(NATIONS_SET, &keep) {
        Some(Marker::Point(point)) => {
            assert_eq!(point.icon, "bricks");
            assert_eq!(point.label, "Keep (Empire)");
        }
        other => panic!("unexpected marker {other:?}"),
    }
    match backend.marker(NATIONS_SET, &gate) {
        Some(Marker::Point(point)) => {
            assert_eq!(point.icon, "pirateflag");
            assert_eq!(point.label, "Gate (Not claimed)");
        }
        other => panic!("unexpected marker {other:?}"),
    }
    match backend.marker(NATIONS_SET, &format!("territory-{}", ridge)) {
        Some(Marker::Circle(circle)) => assert_eq!(circle.style.line_color, 0x3355ff),
        other => panic!("unexpected marker {other:?}"),
    }

    Territory::delete(&db, ridge).unwrap();
    drain_until(&tick, || backend.len(NATIONS_SET) == 1).await;
    assert_eq!(backend.ids(NATIONS_SET), vec![marker]);
}

#[tokio::test]
async fn space_map_refreshes_on_body_changes() {
    let db = database();
    let caches = Caches::new(&db, CacheOptions::default());
    let tick = TickQueue::new();
    let backend = Arc::new(MemoryMap::new());
    let map = SpaceMap::new(caches.clone(), backend.clone(), tick.clone());
    map.install();
    caches.load_all().await.unwrap();
    map.refresh();
    assert_eq!(backend.len(SPACE_SET), 0);

    let sol = Star::create(&db, "Sol", "space", Vec3i::new(0, 0, 0), "G").unwrap();
    let terra = Planet::create(&db, "Terra", Some(sol), "space", "terra", Vec3i::new(300, 0, 400), 10).unwrap();

    drain_until(&tick, || backend.len(SPACE_SET) == 3).await;

    match backend.marker(SPACE_SET, &format!("{}_orbit", terra)) {
        Some(Marker::Circle(orbit)) => {
            assert_eq!(orbit.radius, 500);
            assert_eq!((orbit.x, orbit.z), (0, 0));
        }
        other => panic!("unexpected marker {other:?}"),
    }
    match backend.marker(SPACE_SET, &sol.to_string()) {
        Some(Marker::Point(star)) => assert_eq!(star.icon, "sun"),
        other => panic!("unexpected marker {other:?}"),
    }
}
