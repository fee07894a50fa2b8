//! End-to-end tests: a real server on a loopback port and real clients
//!
//! Covers the handshake, the player recount, world-object requests and the
//! save round trip in both directions.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use world_session::client::{Client, ClientEvent};
use world_session::config::{NetworkConfig, StorageConfig};
use world_session::protocol::message::{
    packet_names, LoginData, LoginResponse, RejectionKind, SaveMode, SiteStepMode,
};
use world_session::server::Server;
use world_session::transfer::RetainSnapshot;
use world_session::utils::compression::CompressionKind;

struct Harness {
    dir: TempDir,
    config: NetworkConfig,
    server: Arc<Server>,
    shutdown: CancellationToken,
    task: JoinHandle<world_session::Result<()>>,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(tweak: impl FnOnce(&mut NetworkConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut config = NetworkConfig::default_with_overrides(|c| {
            c.server.address = address.clone();
            c.client.address = address;
            c.client.response_timeout = Duration::from_secs(10);
            c.client.save_dir = dir.path().join("client");
            c.storage = StorageConfig::rooted(dir.path().join("server"));
            c.transfer.part_size_bytes = 32 * 1024;
            c.transfer.compression = CompressionKind::Zstd;
        });
        tweak(&mut config);

        let server = Arc::new(Server::new(config.clone()));
        let shutdown = CancellationToken::new();
        let task = {
            let server = Arc::clone(&server);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { server.run_with_listener(listener, shutdown).await })
        };

        Self {
            dir,
            config,
            server,
            shutdown,
            task,
        }
    }

    async fn client(&self) -> Client {
        Client::connect(&self.config, Arc::new(RetainSnapshot))
            .await
            .unwrap()
    }

    /// Connect and register a fresh account
    async fn player(&self, name: &str) -> Client {
        let mut client = self.client().await;
        client.register(name, "hunter2").unwrap();
        let response = login_response(&mut client).await;
        assert_eq!(response.try_response, Some(LoginResponse::Login));
        client
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.task.await.unwrap().unwrap();
    }
}

/// Skip events until one matches
async fn wait_for<T>(client: &mut Client, mut pick: impl FnMut(ClientEvent) -> Option<T>) -> T {
    loop {
        let event = client.expect_event().await.unwrap();
        if let Some(found) = pick(event) {
            return found;
        }
    }
}

async fn login_response(client: &mut Client) -> LoginData {
    wait_for(client, |event| match event {
        ClientEvent::LoginResponse(data) => Some(data),
        _ => None,
    })
    .await
}

async fn recount(client: &mut Client, players: usize) -> Vec<String> {
    wait_for(client, |event| match event {
        ClientEvent::PlayerRecount(data) if data.current_players == players => {
            Some(data.player_names)
        }
        _ => None,
    })
    .await
}

async fn wait_for_file(path: &Path) -> Vec<u8> {
    for _ in 0..200 {
        if let Ok(bytes) = tokio::fs::read(path).await {
            return bytes;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("{} never appeared", path.display());
}

fn world_bytes() -> Vec<u8> {
    (0..300_000u32)
        .flat_map(|i| (i.wrapping_mul(2_654_435_761) >> 13).to_le_bytes())
        .collect()
}

#[tokio::test]
async fn test_register_and_recount() {
    let harness = Harness::start().await;

    let mut alice = harness.player("alice").await;
    assert_eq!(recount(&mut alice, 1).await, vec!["alice".to_string()]);

    let mut bob = harness.player("bob").await;
    assert_eq!(recount(&mut bob, 2).await, vec!["alice", "bob"]);
    assert_eq!(recount(&mut alice, 2).await, vec!["alice", "bob"]);

    bob.disconnect();
    assert_eq!(recount(&mut alice, 1).await, vec!["alice".to_string()]);

    let metrics = harness.server.context().metrics.snapshot();
    assert_eq!(metrics.logins_success, 2);
    harness.stop().await;
}

#[tokio::test]
async fn test_refused_login_closes_connection() {
    let harness = Harness::start().await;
    drop(harness.player("alice").await);

    let mut intruder = harness.client().await;
    intruder.login("alice", "wrong").unwrap();
    let response = login_response(&mut intruder).await;
    assert_eq!(response.try_response, Some(LoginResponse::InvalidLogin));
    wait_for(&mut intruder, |event| match event {
        ClientEvent::Disconnected(_) => Some(()),
        _ => None,
    })
    .await;

    let mut outdated = harness.client().await;
    outdated
        .send_handshake(
            packet_names::LOGIN,
            LoginData::credentials("alice", "hunter2", "0.0.0-old"),
        )
        .unwrap();
    let response = login_response(&mut outdated).await;
    assert_eq!(response.try_response, Some(LoginResponse::WrongVersion));
    harness.stop().await;
}

#[tokio::test]
async fn test_second_login_evicts_first() {
    let harness = Harness::start().await;
    let mut first = harness.player("alice").await;

    let mut second = harness.client().await;
    second.login("alice", "hunter2").unwrap();
    assert_eq!(
        login_response(&mut second).await.try_response,
        Some(LoginResponse::Login)
    );

    let evicted = login_response(&mut first).await;
    assert_eq!(evicted.try_response, Some(LoginResponse::ExtraLogin));
    harness.stop().await;
}

#[tokio::test]
async fn test_site_requests_over_the_wire() {
    let harness = Harness::start().await;
    let mut alice = harness.player("alice").await;
    let mut bob = harness.player("bob").await;

    alice.build_site(10, "Outpost", false).unwrap();
    let accepted = wait_for(&mut alice, |event| match event {
        ClientEvent::Site(site) => Some(site),
        _ => None,
    })
    .await;
    assert_eq!(accepted.step_mode, SiteStepMode::Accept);
    assert_eq!(accepted.tile, 10);

    let built = wait_for(&mut bob, |event| match event {
        ClientEvent::Site(site) => Some(site),
        _ => None,
    })
    .await;
    assert_eq!(built.step_mode, SiteStepMode::Build);
    assert_eq!(
        built.record.and_then(|r| r.owner),
        Some("alice".to_string())
    );

    bob.destroy_site(10).unwrap();
    let rejection = wait_for(&mut bob, |event| match event {
        ClientEvent::Rejected(r) => Some(r),
        _ => None,
    })
    .await;
    assert_eq!(rejection.kind, RejectionKind::NotOwner);
    assert_eq!(rejection.tile, Some(10));

    // The rejection left the connection usable
    bob.site_info(10).unwrap();
    let info = wait_for(&mut bob, |event| match event {
        ClientEvent::Site(site) if site.step_mode == SiteStepMode::Info => Some(site),
        _ => None,
    })
    .await;
    assert!(info.record.is_some());

    alice.deposit_worker(10, b"pawn".to_vec()).unwrap();
    alice.retrieve_worker(10).unwrap();
    let retrieved = wait_for(&mut alice, |event| match event {
        ClientEvent::Site(site) if site.step_mode == SiteStepMode::Retrieve => Some(site),
        _ => None,
    })
    .await;
    assert_eq!(
        retrieved.record.and_then(|r| r.worker_payload),
        Some(b"pawn".to_vec())
    );
    harness.stop().await;
}

#[tokio::test]
async fn test_sites_can_be_disabled() {
    let harness = Harness::start_with(|c| c.world.enable_sites = false).await;
    let mut alice = harness.player("alice").await;

    alice.build_site(1, "Outpost", false).unwrap();
    let rejection = wait_for(&mut alice, |event| match event {
        ClientEvent::Rejected(r) => Some(r),
        _ => None,
    })
    .await;
    assert_eq!(rejection.kind, RejectionKind::FeatureDisabled);
    harness.stop().await;
}

#[tokio::test]
async fn test_save_and_quit_then_restore_on_login() {
    let harness = Harness::start().await;
    let original = world_bytes();
    let local_save = harness.path("alice-local.sav");
    tokio::fs::write(&local_save, &original).await.unwrap();

    let mut alice = harness.player("alice").await;
    alice.save_and_quit(&local_save).await.unwrap();
    let finished = wait_for(&mut alice, |event| match event {
        ClientEvent::UploadFinished(mode) => Some(mode),
        _ => None,
    })
    .await;
    assert_eq!(finished, SaveMode::Disconnect);
    wait_for(&mut alice, |event| match event {
        ClientEvent::Disconnected(_) => Some(()),
        _ => None,
    })
    .await;

    let stored = wait_for_file(&harness.path("server/saves/alice.mpsave")).await;
    assert_eq!(stored, original);

    let mut again = harness.client().await;
    again.login("alice", "hunter2").unwrap();
    let snapshot = wait_for(&mut again, |event| match event {
        ClientEvent::SnapshotReceived(snapshot) => Some(snapshot),
        _ => None,
    })
    .await;
    assert_eq!(snapshot.mode, SaveMode::Autosave);
    assert_eq!(snapshot.path, harness.path("client/alice.mpsave"));
    assert_eq!(tokio::fs::read(&snapshot.path).await.unwrap(), original);
    harness.stop().await;
}

#[tokio::test]
async fn test_site_before_login_is_violation() {
    let harness = Harness::start().await;
    let mut anonymous = harness.client().await;

    anonymous.site_info(1).unwrap();
    wait_for(&mut anonymous, |event| match event {
        ClientEvent::Disconnected(_) => Some(()),
        _ => None,
    })
    .await;

    let metrics = harness.server.context().metrics.snapshot();
    assert_eq!(metrics.protocol_violations, 1);
    harness.stop().await;
}
