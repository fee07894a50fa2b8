//! Reader and writer loops for one connection, shared by both roles.

use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::packet_names;
use crate::session::Session;
use crate::utils::timeout::SHUTDOWN_TIMEOUT;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

/// Why a session's loops stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Local side called [`Session::disconnect`]
    Requested,
    /// The peer closed the stream
    PeerClosed,
    IdleTimeout,
    Violation(String),
    Transport(String),
}

impl DisconnectReason {
    /// Disconnects the local side asked for, as opposed to network failure
    pub fn is_intentional(&self) -> bool {
        matches!(self, DisconnectReason::Requested)
    }
}

/// Run a connection until either side ends it.
///
/// Frames from `io` are routed through `dispatcher` on this task. Packets
/// queued on the session are written by a spawned writer task in FIFO order.
/// Returns once the writer has flushed and closed, or the shutdown timeout
/// expired.
#[instrument(skip_all, fields(session = session.id(), peer = %session.peer()))]
pub async fn run_session<S, C>(
    io: S,
    session: Arc<Session>,
    outbound: mpsc::UnboundedReceiver<Packet>,
    ctx: Arc<C>,
    dispatcher: Arc<Dispatcher<C>>,
    idle_timeout: Option<Duration>,
) -> DisconnectReason
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: Send + Sync + 'static,
{
    let (sink, mut stream) = Framed::new(io, PacketCodec).split();

    let writer_session = Arc::clone(&session);
    let writer = tokio::spawn(async move {
        if let Err(e) = write_loop(sink, outbound, &writer_session).await {
            debug!(error = %e, "Writer stopped");
        }
        // A dead writer leaves nothing for the reader to answer to
        writer_session.disconnect();
    });

    let reason = read_loop(&mut stream, &session, &ctx, &dispatcher, idle_timeout).await;
    session.disconnect();

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Writer task panicked"),
        Err(_) => warn!("Writer did not flush before the shutdown timeout"),
    }

    info!(reason = ?reason, "Session closed");
    reason
}

async fn read_loop<S, C>(
    stream: &mut SplitStream<Framed<S, PacketCodec>>,
    session: &Arc<Session>,
    ctx: &Arc<C>,
    dispatcher: &Dispatcher<C>,
    idle_timeout: Option<Duration>,
) -> DisconnectReason
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = session.closed() => return DisconnectReason::Requested,
            next = next_frame(stream, idle_timeout) => next,
        };

        let packet = match next {
            Err(_) => return DisconnectReason::IdleTimeout,
            Ok(None) => return DisconnectReason::PeerClosed,
            Ok(Some(Err(e))) if e.is_fatal() => {
                session.metrics().protocol_violation();
                error!(error = %e, "Malformed frame");
                return DisconnectReason::Violation(e.to_string());
            }
            Ok(Some(Err(e))) => return DisconnectReason::Transport(e.to_string()),
            Ok(Some(Ok(packet))) => packet,
        };

        session.metrics().packet_received();
        let type_name = packet.type_name().to_string();
        debug!(packet = %type_name, bytes = packet.contents().len(), "Routing packet");

        match dispatcher
            .route(Arc::clone(ctx), Arc::clone(session), packet)
            .await
        {
            Ok(()) => {}
            Err(ProtocolError::Rejected(rejection)) => {
                session.metrics().rejection();
                warn!(packet = %type_name, %rejection, "Request rejected");
                if let Err(e) = session.send_payload(packet_names::REJECTION, &rejection) {
                    debug!(error = %e, "Could not queue rejection");
                }
            }
            Err(e) if e.is_fatal() => {
                session.metrics().protocol_violation();
                error!(packet = %type_name, error = %e, "Dropping connection");
                return DisconnectReason::Violation(e.to_string());
            }
            Err(e @ (ProtocolError::UnknownPacketType(_) | ProtocolError::NoActiveTransfer)) => {
                warn!(packet = %type_name, error = %e, "Ignoring packet");
            }
            Err(e) => {
                error!(packet = %type_name, error = %e, "Handler failed");
            }
        }
    }
}

/// `Err` on idle timeout, `Ok(None)` on end of stream
async fn next_frame<S>(
    stream: &mut SplitStream<Framed<S, PacketCodec>>,
    idle_timeout: Option<Duration>,
) -> std::result::Result<Option<Result<Packet>>, tokio::time::error::Elapsed>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next()).await,
        None => Ok(stream.next().await),
    }
}

async fn write_loop<S>(
    mut sink: SplitSink<Framed<S, PacketCodec>, Packet>,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
    session: &Session,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            packet = outbound.recv() => match packet {
                Some(packet) => {
                    sink.send(packet).await?;
                    session.metrics().packet_sent();
                }
                None => break,
            },
            _ = session.closed() => {
                while let Ok(packet) = outbound.try_recv() {
                    sink.send(packet).await?;
                    session.metrics().packet_sent();
                }
                break;
            }
        }
    }
    sink.close().await
}
