//! Integration tests for the world-object authority
//!
//! Sessions are registered directly with the connection registry; their send
//! queues are inspected to check who was told what.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use world_session::accounts::{FactionRank, FactionRecord, UserRecord};
use world_session::core::serialization::SerializationFormat;
use world_session::protocol::message::{
    packet_names, Rejection, RejectionCategory, RejectionKind, SiteData, SiteStepMode,
};
use world_session::session::{ConnectionRegistry, Session};
use world_session::utils::metrics::Metrics;
use world_session::world::{
    spawn_reward_ticker, Goodwill, OwnershipRelationship, SettlementRecord, WorldAuthority,
    WorldObjectRecord,
};
use world_session::{Packet, ProtocolError};

struct World {
    _dir: TempDir,
    registry: Arc<ConnectionRegistry>,
    authority: Arc<WorldAuthority>,
}

type Player = (Arc<Session>, UnboundedReceiver<Packet>);

fn world() -> World {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new(64));
    let authority = Arc::new(WorldAuthority::new(
        &dir.path().join("sites"),
        &dir.path().join("settlements"),
        SerializationFormat::Json,
        Arc::clone(&registry),
        Arc::new(OwnershipRelationship),
    ));
    World {
        _dir: dir,
        registry,
        authority,
    }
}

fn user(name: &str, faction: Option<FactionRecord>) -> UserRecord {
    UserRecord {
        username: name.to_string(),
        password_hash: String::new(),
        salt: String::new(),
        saved_ip: "127.0.0.1".to_string(),
        is_banned: false,
        faction,
    }
}

fn north() -> FactionRecord {
    FactionRecord::new("North")
        .with_member("alice", FactionRank::Admin)
        .with_member("carol", FactionRank::Member)
        .with_member("dave", FactionRank::Moderator)
}

fn join(world: &World, user: UserRecord) -> Player {
    let peer: SocketAddr = "127.0.0.1:41000".parse().unwrap();
    let (session, rx) = Session::new(world.registry.next_id(), peer, Arc::new(Metrics::new()));
    session.set_user(user);
    world.registry.insert(Arc::clone(&session)).unwrap();
    (session, rx)
}

fn rejection(result: Result<impl std::fmt::Debug, ProtocolError>) -> Rejection {
    match result {
        Err(ProtocolError::Rejected(rejection)) => rejection,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

fn site_packets(rx: &mut UnboundedReceiver<Packet>) -> Vec<SiteData> {
    let mut out = Vec::new();
    while let Ok(packet) = rx.try_recv() {
        assert_eq!(packet.type_name(), packet_names::SITE);
        out.push(packet.decode().unwrap());
    }
    out
}

#[tokio::test]
async fn test_concurrent_builds_on_one_tile() {
    let world = world();
    let players: Vec<Player> = (0..8)
        .map(|i| join(&world, user(&format!("builder{i}"), None)))
        .collect();

    let mut tasks = Vec::new();
    for (session, _) in &players {
        let authority = Arc::clone(&world.authority);
        let session = Arc::clone(session);
        tasks.push(tokio::spawn(async move {
            authority.build(&session, 7, "Outpost", false).await
        }));
    }

    let mut built = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(record) => {
                assert_eq!(record.tile, 7);
                built += 1;
            }
            Err(ProtocolError::Rejected(r)) => {
                assert_eq!(r.kind, RejectionKind::TileInUse);
                assert_eq!(r.kind.category(), RejectionCategory::ResourceConflict);
                conflicts += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(built, 1);
    assert_eq!(conflicts, 7);
    assert!(world.authority.locks().is_empty());
}

#[tokio::test]
async fn test_build_accepts_requester_and_notifies_others() {
    let world = world();
    let (alice, mut alice_rx) = join(&world, user("alice", None));
    let (_bob, mut bob_rx) = join(&world, user("bob", None));

    let record = world.authority.build(&alice, 12, "Farm", false).await.unwrap();
    assert_eq!(record.owner.as_deref(), Some("alice"));
    assert!(world.authority.sites().exists("12").await.unwrap());

    let to_alice = site_packets(&mut alice_rx);
    assert_eq!(to_alice.len(), 1);
    assert_eq!(to_alice[0].step_mode, SiteStepMode::Accept);
    assert_eq!(to_alice[0].relationship, Goodwill::Personal);

    let to_bob = site_packets(&mut bob_rx);
    assert_eq!(to_bob.len(), 1);
    assert_eq!(to_bob[0].step_mode, SiteStepMode::Build);
    assert_eq!(to_bob[0].relationship, Goodwill::Neutral);
    assert_eq!(to_bob[0].record.as_ref(), Some(&record));
}

#[tokio::test]
async fn test_settlement_tile_is_in_use() {
    let world = world();
    let (alice, mut rx) = join(&world, user("alice", None));
    world
        .authority
        .settlements()
        .save(&SettlementRecord {
            tile: 30,
            owner: "bob".to_string(),
        })
        .await
        .unwrap();

    let r = rejection(world.authority.build(&alice, 30, "Outpost", false).await);
    assert_eq!(r.kind, RejectionKind::TileInUse);
    assert_eq!(r.tile, Some(30));
    assert!(!world.authority.sites().exists("30").await.unwrap());
    assert!(site_packets(&mut rx).is_empty());
}

#[tokio::test]
async fn test_destroy_by_non_owner_is_denied() {
    let world = world();
    let (alice, _alice_rx) = join(&world, user("alice", None));
    let (bob, _bob_rx) = join(&world, user("bob", None));
    world.authority.build(&alice, 42, "Outpost", false).await.unwrap();

    let r = rejection(world.authority.destroy(&bob, 42).await);
    assert_eq!(r.kind, RejectionKind::NotOwner);
    assert_eq!(
        r.to_string(),
        "AuthorizationDenied(NotOwner): bob does not own tile 42"
    );
    assert!(world.authority.sites().exists("42").await.unwrap());
}

#[tokio::test]
async fn test_destroy_missing_tile_is_not_found() {
    let world = world();
    let (alice, _rx) = join(&world, user("alice", None));

    let r = rejection(world.authority.destroy(&alice, 99).await);
    assert_eq!(r.kind, RejectionKind::NotFound);
}

#[tokio::test]
async fn test_worker_blocks_destroy_until_retrieved() {
    let world = world();
    let (alice, mut alice_rx) = join(&world, user("alice", None));
    let (_bob, mut bob_rx) = join(&world, user("bob", None));
    world.authority.build(&alice, 5, "Mine", false).await.unwrap();
    world.authority.deposit(&alice, 5, b"pawn:miner".to_vec()).await.unwrap();

    let r = rejection(world.authority.destroy(&alice, 5).await);
    assert_eq!(r.kind, RejectionKind::WorkerPresent);

    let payload = world.authority.retrieve(&alice, 5).await.unwrap();
    assert_eq!(payload, b"pawn:miner");
    site_packets(&mut alice_rx);
    site_packets(&mut bob_rx);

    world.authority.destroy(&alice, 5).await.unwrap();
    assert!(!world.authority.sites().exists("5").await.unwrap());
    for rx in [&mut alice_rx, &mut bob_rx] {
        let notices = site_packets(rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].step_mode, SiteStepMode::Destroy);
        assert_eq!(notices[0].tile, 5);
    }
}

#[tokio::test]
async fn test_worker_slot_is_exclusive() {
    let world = world();
    let (alice, mut rx) = join(&world, user("alice", None));
    let (bob, _bob_rx) = join(&world, user("bob", None));
    world.authority.build(&alice, 8, "Camp", false).await.unwrap();
    site_packets(&mut rx);

    let r = rejection(world.authority.retrieve(&alice, 8).await);
    assert_eq!(r.kind, RejectionKind::SlotEmpty);

    let r = rejection(world.authority.deposit(&bob, 8, vec![1]).await);
    assert_eq!(r.kind, RejectionKind::NotOwner);

    let first = {
        let authority = Arc::clone(&world.authority);
        let alice = Arc::clone(&alice);
        tokio::spawn(async move { authority.deposit(&alice, 8, vec![1]).await })
    };
    let second = {
        let authority = Arc::clone(&world.authority);
        let alice = Arc::clone(&alice);
        tokio::spawn(async move { authority.deposit(&alice, 8, vec![2]).await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(ProtocolError::Rejected(rej)) if rej.kind == RejectionKind::SlotOccupied
    )));
    // Deposit succeeds silently
    assert!(site_packets(&mut rx).is_empty());

    let payload = world.authority.retrieve(&alice, 8).await.unwrap();
    assert!(payload == vec![1] || payload == vec![2]);
    let replies = site_packets(&mut rx);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].step_mode, SiteStepMode::Retrieve);
    assert_eq!(
        replies[0].record.as_ref().and_then(|r| r.worker_payload.clone()),
        Some(payload)
    );

    let stored = world.authority.sites().load("8").await.unwrap().unwrap();
    assert!(!stored.has_worker());
}

#[tokio::test]
async fn test_faction_build_rules() {
    let world = world();
    let (loner, _loner_rx) = join(&world, user("loner", None));
    let (carol, _carol_rx) = join(&world, user("carol", Some(north())));
    let (dave, _dave_rx) = join(&world, user("dave", Some(north())));

    let r = rejection(world.authority.build(&loner, 1, "Fort", true).await);
    assert_eq!(r.kind, RejectionKind::NotInFaction);

    let r = rejection(world.authority.build(&carol, 1, "Fort", true).await);
    assert_eq!(r.kind, RejectionKind::NoPower);

    let record = world.authority.build(&dave, 1, "Fort", true).await.unwrap();
    assert!(record.belongs_to_faction("North"));
    assert_eq!(record.owner.as_deref(), Some("dave"));

    let r = rejection(world.authority.deposit(&dave, 1, vec![0]).await);
    assert_eq!(r.kind, RejectionKind::NotSupported);
    let r = rejection(world.authority.retrieve(&dave, 1).await);
    assert_eq!(r.kind, RejectionKind::NotSupported);
}

#[tokio::test]
async fn test_faction_destroy_rules() {
    let world = world();
    let south = FactionRecord::new("South").with_member("erin", FactionRank::Admin);
    let (alice, _alice_rx) = join(&world, user("alice", Some(north())));
    let (carol, _carol_rx) = join(&world, user("carol", Some(north())));
    let (dave, _dave_rx) = join(&world, user("dave", Some(north())));
    let (erin, _erin_rx) = join(&world, user("erin", Some(south)));
    world.authority.build(&dave, 2, "Fort", true).await.unwrap();

    let r = rejection(world.authority.destroy(&erin, 2).await);
    assert_eq!(r.kind, RejectionKind::FactionMismatch);

    let r = rejection(world.authority.destroy(&carol, 2).await);
    assert_eq!(r.kind, RejectionKind::NoPower);

    // Any member with power may destroy, not only the builder
    world.authority.destroy(&alice, 2).await.unwrap();
    assert!(!world.authority.sites().exists("2").await.unwrap());
}

#[tokio::test]
async fn test_reward_tick_targets_owners_with_workers() {
    let world = world();
    let (alice, mut alice_rx) = join(&world, user("alice", Some(north())));
    let (_carol, mut carol_rx) = join(&world, user("carol", Some(north())));
    let (_bob, mut bob_rx) = join(&world, user("bob", None));

    let sites = world.authority.sites();
    let mut with_worker = WorldObjectRecord::personal(3, "alice", "Mine");
    with_worker.worker_payload = Some(vec![1]);
    sites.save(&with_worker).await.unwrap();
    let mut also_worker = WorldObjectRecord::personal(1, "alice", "Farm");
    also_worker.worker_payload = Some(vec![2]);
    sites.save(&also_worker).await.unwrap();
    sites
        .save(&WorldObjectRecord::personal(2, "alice", "Empty"))
        .await
        .unwrap();
    let mut faction_site = WorldObjectRecord::personal(9, "dave", "Fort");
    faction_site.faction = Some(north());
    faction_site.worker_payload = Some(vec![3]);
    sites.save(&faction_site).await.unwrap();
    let mut idle_faction_site = WorldObjectRecord::personal(10, "dave", "Fort");
    idle_faction_site.faction = Some(north());
    sites.save(&idle_faction_site).await.unwrap();

    let sent = world.authority.reward_tick().await.unwrap();
    assert_eq!(sent, 2);

    let to_alice = site_packets(&mut alice_rx);
    assert_eq!(to_alice.len(), 1);
    assert_eq!(to_alice[0].step_mode, SiteStepMode::Reward);
    assert_eq!(to_alice[0].tile, -1);
    assert_eq!(to_alice[0].reward_tiles, vec![1, 3, 9]);

    let to_carol = site_packets(&mut carol_rx);
    assert_eq!(to_carol.len(), 1);
    assert_eq!(to_carol[0].reward_tiles, vec![9]);

    assert!(site_packets(&mut bob_rx).is_empty());
    assert_eq!(alice.metrics().snapshot().reward_packets, 1);
}

#[tokio::test]
async fn test_reward_tick_with_no_sites_sends_nothing() {
    let world = world();
    let (_alice, mut rx) = join(&world, user("alice", None));

    assert_eq!(world.authority.reward_tick().await.unwrap(), 0);
    assert!(site_packets(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reward_ticker_survives_failed_ticks_and_stops_on_cancel() {
    let world = world();
    let (_alice, mut rx) = join(&world, user("alice", None));

    // A plain file where the sites directory should be makes every scan fail
    let sites_dir = world.authority.sites().dir().to_path_buf();
    tokio::fs::write(&sites_dir, b"not a directory").await.unwrap();
    assert!(world.authority.reward_tick().await.is_err());

    let period = Duration::from_secs(60);
    let shutdown = CancellationToken::new();
    let ticker = spawn_reward_ticker(Arc::clone(&world.authority), period, shutdown.clone());

    tokio::time::sleep(period * 2 + period / 2).await;
    assert!(site_packets(&mut rx).is_empty());

    tokio::fs::remove_file(&sites_dir).await.unwrap();
    let mut mine = WorldObjectRecord::personal(5, "alice", "Mine");
    mine.worker_payload = Some(vec![1]);
    world.authority.sites().save(&mine).await.unwrap();

    let packet = tokio::time::timeout(period * 10, rx.recv())
        .await
        .expect("a later tick should still run")
        .unwrap();
    let reward: SiteData = packet.decode().unwrap();
    assert_eq!(reward.step_mode, SiteStepMode::Reward);
    assert_eq!(reward.reward_tiles, vec![5]);

    shutdown.cancel();
    tokio::time::timeout(period, ticker)
        .await
        .expect("ticker should stop once cancelled")
        .unwrap();

    site_packets(&mut rx);
    tokio::time::sleep(period * 3).await;
    assert!(site_packets(&mut rx).is_empty());
}

#[tokio::test]
async fn test_info_reports_record_and_standing() {
    let world = world();
    let (alice, mut alice_rx) = join(&world, user("alice", None));
    let (bob, mut bob_rx) = join(&world, user("bob", None));
    world.authority.build(&alice, 4, "Camp", false).await.unwrap();
    site_packets(&mut alice_rx);
    site_packets(&mut bob_rx);

    let found = world.authority.info(&bob, 4).await.unwrap();
    assert_eq!(found.map(|r| r.tile), Some(4));
    let reply = site_packets(&mut bob_rx);
    assert_eq!(reply[0].step_mode, SiteStepMode::Info);
    assert_eq!(reply[0].relationship, Goodwill::Neutral);

    assert!(world.authority.info(&alice, 77).await.unwrap().is_none());
    let reply = site_packets(&mut alice_rx);
    assert_eq!(reply[0].tile, 77);
    assert!(reply[0].record.is_none());
}

#[tokio::test]
async fn test_unauthenticated_session_is_violation() {
    let world = world();
    let peer: SocketAddr = "127.0.0.1:41001".parse().unwrap();
    let (stranger, _rx) = Session::new(99, peer, Arc::new(Metrics::new()));

    let error = world
        .authority
        .build(&stranger, 1, "Outpost", false)
        .await
        .expect_err("no user");
    assert!(error.is_fatal());
}
