//! # Client Role
//!
//! A connection to the authoritative server that runs the same session driver
//! as the server side, with its own dispatch table. Everything the server
//! sends surfaces as a [`ClientEvent`].

mod handlers;

use crate::accounts::FactionRecord;
use crate::config::NetworkConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::{
    packet_names, LoginData, PlayerRecountData, Rejection, SaveMode, SiteData, SiteStepMode,
};
use crate::session::{run_session, DisconnectReason, Session};
use crate::transfer::{self, PartProgress, ReceivedSnapshot, SnapshotSink, TransferSettings};
use crate::utils::metrics::Metrics;
use crate::utils::timeout::with_timeout_error;
use crate::world::WorldObjectRecord;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Version string sent in every handshake
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Something the server told us, or a change in connection state
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    LoginResponse(LoginData),
    PlayerRecount(PlayerRecountData),
    Site(SiteData),
    Rejected(Rejection),
    SnapshotReceived(ReceivedSnapshot),
    /// Our last upload part was queued
    UploadFinished(SaveMode),
    Disconnected(DisconnectReason),
}

/// State shared with the client's packet handlers
pub struct ClientContext {
    events: mpsc::UnboundedSender<ClientEvent>,
    transfer: TransferSettings,
    save_dir: PathBuf,
    sink: Arc<dyn SnapshotSink>,
    username: RwLock<Option<String>>,
}

impl ClientContext {
    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("Client dropped its event receiver");
        }
    }

    /// Where a snapshot sent by the server is promoted to
    fn download_path(&self) -> PathBuf {
        let name = self
            .username
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| "server".to_string());
        self.save_dir.join(format!("{name}.mpsave"))
    }

    fn remember_username(&self, username: &str) {
        *self.username.write().unwrap_or_else(PoisonError::into_inner) = Some(username.to_string());
    }

    /// Report a finished upload; a final save also ends the session
    fn upload_progress(&self, session: &Session, progress: PartProgress) {
        if let PartProgress::Finished(mode) = progress {
            self.emit(ClientEvent::UploadFinished(mode));
            if mode == SaveMode::Disconnect {
                info!("Final save queued, disconnecting");
                session.disconnect();
            }
        }
    }
}

pub struct Client {
    session: Arc<Session>,
    ctx: Arc<ClientContext>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    response_timeout: Duration,
    driver: JoinHandle<()>,
}

impl Client {
    /// Connect to `config.client.address` and start the session loops
    pub async fn connect(config: &NetworkConfig, sink: Arc<dyn SnapshotSink>) -> Result<Self> {
        let address = config.client.address.clone();
        let stream = with_timeout_error(
            async { Ok(TcpStream::connect(&address).await?) },
            config.client.connection_timeout,
        )
        .await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        info!(%peer, "Connected to server");

        let (events_tx, events) = mpsc::unbounded_channel();
        let ctx = Arc::new(ClientContext {
            events: events_tx,
            transfer: TransferSettings::from(&config.transfer),
            save_dir: config.client.save_dir.clone(),
            sink,
            username: RwLock::new(None),
        });

        let (session, outbound) = Session::new(0, peer, Arc::new(Metrics::new()));
        let dispatcher: Arc<Dispatcher<ClientContext>> = Arc::new(handlers::client_dispatcher());
        let driver = {
            let session = Arc::clone(&session);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let reason =
                    run_session(stream, Arc::clone(&session), outbound, Arc::clone(&ctx), dispatcher, None).await;
                transfer::abandon(&session).await;
                ctx.emit(ClientEvent::Disconnected(reason));
            })
        };

        Ok(Self {
            session,
            ctx,
            events,
            response_timeout: config.client.response_timeout,
            driver,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        self.send_handshake(packet_names::LOGIN, LoginData::credentials(username, password, CLIENT_VERSION))
    }

    pub fn register(&self, username: &str, password: &str) -> Result<()> {
        self.send_handshake(packet_names::REGISTER, LoginData::credentials(username, password, CLIENT_VERSION))
    }

    /// Send a handshake packet with caller-supplied fields
    pub fn send_handshake(&self, type_name: &'static str, mut data: LoginData) -> Result<()> {
        self.ctx.remember_username(&data.username);
        let sent = self.session.send_payload(type_name, &data);
        data.clear_secret();
        sent
    }

    pub fn request_site(&self, request: &SiteData) -> Result<()> {
        self.session.send_payload(packet_names::SITE, request)
    }

    pub fn build_site(&self, tile: i32, kind: &str, for_faction: bool) -> Result<()> {
        let mut record = WorldObjectRecord::request(tile, kind);
        if for_faction {
            // The server substitutes the requester's own faction
            record.faction = Some(FactionRecord::new(String::new()));
        }
        self.request_site(&SiteData::request(SiteStepMode::Build, tile).with_record(record))
    }

    pub fn destroy_site(&self, tile: i32) -> Result<()> {
        self.request_site(&SiteData::request(SiteStepMode::Destroy, tile))
    }

    pub fn site_info(&self, tile: i32) -> Result<()> {
        self.request_site(&SiteData::request(SiteStepMode::Info, tile))
    }

    pub fn deposit_worker(&self, tile: i32, payload: Vec<u8>) -> Result<()> {
        let mut record = WorldObjectRecord::request(tile, String::new());
        record.worker_payload = Some(payload);
        self.request_site(&SiteData::request(SiteStepMode::Deposit, tile).with_record(record))
    }

    pub fn retrieve_worker(&self, tile: i32) -> Result<()> {
        self.request_site(&SiteData::request(SiteStepMode::Retrieve, tile))
    }

    /// Start sending the snapshot at `path` to the server
    pub async fn upload_snapshot(&self, path: &Path, mode: SaveMode) -> Result<()> {
        let progress = transfer::start_upload(&self.session, path, &self.ctx.transfer, mode).await?;
        self.ctx.upload_progress(&self.session, progress);
        Ok(())
    }

    /// Upload a final snapshot; the session closes once its last part is queued
    pub async fn save_and_quit(&self, path: &Path) -> Result<()> {
        self.upload_snapshot(path, SaveMode::Disconnect).await
    }

    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Wait up to the configured response timeout for the next event
    pub async fn expect_event(&mut self) -> Result<ClientEvent> {
        match tokio::time::timeout(self.response_timeout, self.events.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(ProtocolError::ConnectionClosed),
            Err(_) => Err(ProtocolError::Timeout),
        }
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Wait for the session loops to finish. Await this at most once.
    pub async fn closed(&mut self) -> Result<()> {
        (&mut self.driver)
            .await
            .map_err(|e| ProtocolError::Custom(format!("client driver failed: {e}")))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.session.disconnect();
    }
}
