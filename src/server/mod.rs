//! # Server Role
//!
//! The accept loop, the handler table and the context they share.
//!
//! Each accepted TCP connection gets a [`Session`] registered in the
//! [`ConnectionRegistry`](crate::session::ConnectionRegistry) and a task
//! running [`run_session`]. When the session ends, for whatever reason, it is
//! removed from the registry, its in-flight transfers are discarded and the
//! remaining players receive a fresh recount.

pub mod context;
pub mod handlers;
pub mod saves;

pub use context::ServerContext;
pub use handlers::server_dispatcher;
pub use saves::SaveStore;

use crate::config::NetworkConfig;
use crate::error::Result;
use crate::protocol::dispatcher::Dispatcher;
use crate::session::{run_session, DisconnectReason, Session};
use crate::transfer;
use crate::world::spawn_reward_ticker;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub struct Server {
    ctx: Arc<ServerContext>,
    dispatcher: Arc<Dispatcher<ServerContext>>,
}

impl Server {
    pub fn new(config: NetworkConfig) -> Self {
        Self::with_context(ServerContext::new(config))
    }

    pub fn with_context(ctx: ServerContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            dispatcher: Arc::new(server_dispatcher()),
        }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.ctx.config.server.address).await?;
        info!(address = %self.ctx.config.server.address, "Listening");
        Ok(listener)
    }

    /// Bind the configured address and serve until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.run_with_listener(listener, shutdown).await
    }

    /// Serve on a pre-bound listener until `shutdown` fires
    #[instrument(skip_all, fields(address = ?listener.local_addr().ok()))]
    pub async fn run_with_listener(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        self.ctx.prepare_storage().await?;
        let ticker = spawn_reward_ticker(
            Arc::clone(&self.ctx.world),
            self.ctx.config.world.reward_interval,
            shutdown.child_token(),
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutting down server. Waiting for sessions to close...");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => self.accept(stream),
                    Err(e) => error!(error = %e, "Error accepting connection"),
                }
            }
        }

        self.drain_sessions().await;
        if let Err(e) = ticker.await {
            error!(error = %e, "Reward ticker panicked");
        }
        self.ctx.metrics.log_metrics();
        Ok(())
    }

    fn accept(&self, stream: TcpStream) {
        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(e) => {
                warn!(error = %e, "Dropping connection without a peer address");
                return;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle");
        }

        let (session, outbound) = Session::new(
            self.ctx.registry.next_id(),
            peer,
            Arc::clone(&self.ctx.metrics),
        );
        if self.ctx.registry.insert(Arc::clone(&session)).is_err() {
            warn!(%peer, "Connection limit reached, refusing peer");
            return;
        }
        self.ctx.metrics.connection_opened();
        info!(session = session.id(), %peer, "Accepted connection");

        let ctx = Arc::clone(&self.ctx);
        let dispatcher = Arc::clone(&self.dispatcher);
        let idle = Some(ctx.config.server.idle_timeout);
        tokio::spawn(async move {
            let reason = run_session(stream, Arc::clone(&session), outbound, Arc::clone(&ctx), dispatcher, idle).await;
            close_session(&ctx, &session, &reason).await;
        });
    }

    /// Ask every session to close and wait for them, bounded by the shutdown timeout
    async fn drain_sessions(&self) {
        for session in self.ctx.registry.sessions() {
            session.disconnect();
        }

        let deadline = tokio::time::sleep(self.ctx.config.server.shutdown_timeout);
        tokio::pin!(deadline);
        loop {
            if self.ctx.registry.is_empty() {
                info!("All sessions closed");
                return;
            }
            tokio::select! {
                _ = &mut deadline => {
                    warn!(remaining = self.ctx.registry.len(), "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        }
    }
}

async fn close_session(ctx: &ServerContext, session: &Arc<Session>, reason: &DisconnectReason) {
    ctx.registry.remove(session.id());
    transfer::abandon(session).await;
    ctx.metrics.connection_closed();

    if let Some(user) = session.username() {
        info!(user = %user, intentional = reason.is_intentional(), "Player left");
        ctx.broadcast_recount();
    }
}
