//! # Sessions
//!
//! One [`Session`] per connected peer, shared between its reader task, its
//! writer task and any handler that wants to reach it. Sending never blocks:
//! packets go into an unbounded FIFO drained by the writer.
//!
//! Disconnection is cooperative. [`Session::disconnect`] cancels the session
//! token; the writer flushes whatever is still queued and then closes.

pub mod driver;
pub mod registry;

pub use driver::{run_session, DisconnectReason};
pub use registry::{ConnectionLimitReached, ConnectionRegistry};

use crate::accounts::UserRecord;
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::transfer::Transfers;
use crate::utils::metrics::Metrics;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

pub type SessionId = u64;

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<Packet>,
    shutdown: CancellationToken,
    user: RwLock<Option<UserRecord>>,
    transfers: Mutex<Transfers>,
    metrics: Arc<Metrics>,
}

impl Session {
    /// Create a session and the receiving end of its send queue
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        metrics: Arc<Metrics>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Packet>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id,
            peer,
            outbound,
            shutdown: CancellationToken::new(),
            user: RwLock::new(None),
            transfers: Mutex::new(Transfers::default()),
            metrics,
        });
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Queue a packet for the writer task
    pub fn send(&self, packet: Packet) -> Result<()> {
        self.outbound
            .send(packet)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    pub fn send_payload<T: Serialize>(&self, type_name: &str, payload: &T) -> Result<()> {
        self.send(Packet::from_payload(type_name, payload)?)
    }

    /// Ask both loops to stop. Already queued packets are still flushed.
    pub fn disconnect(&self) {
        self.shutdown.cancel();
    }

    pub fn is_disconnecting(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn username(&self) -> Option<String> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|user| user.username.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set_user(&self, user: UserRecord) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// The authenticated user, or a protocol violation
    pub fn require_user(&self) -> Result<UserRecord> {
        self.user()
            .ok_or_else(|| ProtocolError::violation(constants::ERR_NOT_AUTHENTICATED))
    }

    pub fn transfers(&self) -> &Mutex<Transfers> {
        &self.transfers
    }
}
