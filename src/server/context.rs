use crate::accounts::UserStore;
use crate::config::NetworkConfig;
use crate::error::Result;
use crate::protocol::message::{packet_names, PlayerRecountData};
use crate::server::saves::SaveStore;
use crate::session::ConnectionRegistry;
use crate::transfer::{RetainSnapshot, SnapshotSink, TransferSettings};
use crate::utils::metrics::Metrics;
use crate::world::{OwnershipRelationship, RelationshipPolicy, WorldAuthority};
use crate::Packet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a server-side handler may touch, built once at startup
pub struct ServerContext {
    pub config: NetworkConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub users: UserStore,
    pub saves: SaveStore,
    pub world: Arc<WorldAuthority>,
    pub transfer: TransferSettings,
    pub snapshot_sink: Arc<dyn SnapshotSink>,
    pub metrics: Arc<Metrics>,
}

impl ServerContext {
    pub fn new(config: NetworkConfig) -> Self {
        Self::with_capabilities(config, Arc::new(OwnershipRelationship), Arc::new(RetainSnapshot))
    }

    pub fn with_capabilities(
        config: NetworkConfig,
        relationship: Arc<dyn RelationshipPolicy>,
        snapshot_sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        let storage = &config.storage;
        let registry = Arc::new(ConnectionRegistry::new(config.server.max_connections));
        let world = Arc::new(WorldAuthority::new(
            &storage.sites_path(),
            &storage.settlements_path(),
            storage.format,
            Arc::clone(&registry),
            relationship,
        ));

        Self {
            users: UserStore::new(storage.users_path(), storage.format),
            saves: SaveStore::new(storage.saves_path()),
            transfer: TransferSettings::from(&config.transfer),
            registry,
            world,
            snapshot_sink,
            metrics: Arc::new(Metrics::new()),
            config,
        }
    }

    /// Create every storage directory up front
    pub async fn prepare_storage(&self) -> Result<()> {
        let storage = &self.config.storage;
        for dir in [
            storage.users_path(),
            storage.sites_path(),
            storage.settlements_path(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        self.saves.ensure_dir().await
    }

    /// Send the connected player list to every authenticated session
    pub fn broadcast_recount(&self) {
        let names = self.registry.player_names();
        let recount = PlayerRecountData {
            current_players: names.len(),
            player_names: names,
        };
        match Packet::from_payload(packet_names::PLAYER_RECOUNT, &recount) {
            Ok(packet) => {
                let delivered = self.registry.broadcast(&packet);
                debug!(players = recount.current_players, delivered, "Player recount");
            }
            Err(e) => warn!(error = %e, "Could not encode player recount"),
        }
    }
}
