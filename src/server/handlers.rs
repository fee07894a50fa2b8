//! Server-side packet handlers.

use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::handshake::{AccountHandshake, HandshakeKind};
use crate::protocol::message::{
    packet_names, FileTransferData, LoginData, LoginResponse, Rejection, RejectionKind, SaveMode, SiteData,
    SiteStepMode,
};
use crate::server::context::ServerContext;
use crate::session::Session;
use crate::transfer;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The server role's dispatch table
pub fn server_dispatcher() -> Dispatcher<ServerContext> {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register(packet_names::LOGIN, handle_login)
        .register(packet_names::REGISTER, handle_register)
        .register(packet_names::SITE, handle_site)
        .register(packet_names::RECEIVE_SAVE_PART, handle_receive_save_part)
        .register(packet_names::REQUEST_SAVE_PART, handle_request_save_part);
    dispatcher
}

/// Malformed payloads are treated as protocol violations
pub(crate) fn decode_payload<T: DeserializeOwned>(packet: &Packet) -> Result<T> {
    packet.decode().map_err(|e| {
        ProtocolError::violation(format!("malformed {} payload: {e}", packet.type_name()))
    })
}

async fn handle_login(ctx: Arc<ServerContext>, session: Arc<Session>, packet: Packet) -> Result<()> {
    complete_handshake(&ctx, &session, &packet, HandshakeKind::Login).await
}

async fn handle_register(ctx: Arc<ServerContext>, session: Arc<Session>, packet: Packet) -> Result<()> {
    complete_handshake(&ctx, &session, &packet, HandshakeKind::Register).await
}

async fn complete_handshake(
    ctx: &ServerContext,
    session: &Arc<Session>,
    packet: &Packet,
    kind: HandshakeKind,
) -> Result<()> {
    if session.is_authenticated() {
        return Err(ProtocolError::violation("handshake repeated on an authenticated session"));
    }

    let mut data: LoginData = decode_payload(packet)?;
    let peer_ip = session.peer().ip().to_string();
    let handshake = AccountHandshake::new(&ctx.config.access, &ctx.users);
    let outcome = match kind {
        HandshakeKind::Login => handshake.login(&data, &peer_ip).await,
        HandshakeKind::Register => handshake.register(&data, &peer_ip).await,
    };
    data.clear_secret();

    let user = match outcome {
        Ok(user) => user,
        Err(refusal) => {
            ctx.metrics.login_failed();
            warn!(user = %data.username, response = ?refusal.response, "Handshake refused");
            session.send_payload(packet_names::LOGIN_RESPONSE, &refusal.into_login_data())?;
            session.disconnect();
            return Ok(());
        }
    };

    let Some(evicted) = ctx.registry.claim_username(session, user.clone()) else {
        debug!(user = %user.username, session = session.id(), "Session closed before its login completed");
        return Ok(());
    };
    for older in evicted {
        warn!(user = %user.username, evicted = older.id(), "Evicting older session");
        let extra = LoginData::response(LoginResponse::ExtraLogin, Vec::new());
        if let Err(e) = older.send_payload(packet_names::LOGIN_RESPONSE, &extra) {
            debug!(error = %e, "Evicted session already closed");
        }
        older.disconnect();
    }

    ctx.metrics.login_succeeded();
    session.send_payload(
        packet_names::LOGIN_RESPONSE,
        &LoginData::response(LoginResponse::Login, Vec::new()),
    )?;
    info!(user = %user.username, session = session.id(), "Logged in");
    ctx.broadcast_recount();

    if ctx.saves.exists(&user.username).await? {
        let save = ctx.saves.path_for(&user.username);
        transfer::start_upload(session, &save, &ctx.transfer, SaveMode::Autosave).await?;
    }
    Ok(())
}

async fn handle_site(ctx: Arc<ServerContext>, session: Arc<Session>, packet: Packet) -> Result<()> {
    session.require_user()?;
    if !ctx.config.world.enable_sites {
        return Err(ProtocolError::Rejected(Rejection::new(
            RejectionKind::FeatureDisabled,
            "sites are disabled on this server",
        )));
    }

    let request: SiteData = decode_payload(&packet)?;
    let tile = request.tile;
    match request.step_mode {
        SiteStepMode::Build => {
            let kind = request
                .record
                .as_ref()
                .map(|record| record.kind.clone())
                .unwrap_or_default();
            let for_faction = request
                .record
                .as_ref()
                .is_some_and(|record| record.faction.is_some());
            ctx.world.build(&session, tile, &kind, for_faction).await?;
        }
        SiteStepMode::Destroy => {
            ctx.world.destroy(&session, tile).await?;
        }
        SiteStepMode::Info => {
            ctx.world.info(&session, tile).await?;
        }
        SiteStepMode::Deposit => {
            let payload = request
                .record
                .and_then(|record| record.worker_payload)
                .ok_or_else(|| ProtocolError::violation("deposit without a worker payload"))?;
            ctx.world.deposit(&session, tile, payload).await?;
        }
        SiteStepMode::Retrieve => {
            ctx.world.retrieve(&session, tile).await?;
        }
        step @ (SiteStepMode::Reward | SiteStepMode::Accept) => {
            return Err(ProtocolError::violation(format!(
                "{step:?} is a server-only site step"
            )));
        }
    }
    Ok(())
}

async fn handle_receive_save_part(
    ctx: Arc<ServerContext>,
    session: Arc<Session>,
    packet: Packet,
) -> Result<()> {
    let user = session.require_user()?;
    let part: FileTransferData = decode_payload(&packet)?;
    let destination = ctx.saves.path_for(&user.username);

    let Some(snapshot) = transfer::receive_part(&session, part, &destination, &ctx.transfer).await? else {
        return Ok(());
    };

    let outcome = ctx.snapshot_sink.try_apply(&snapshot);
    debug!(user = %user.username, outcome = ?outcome, "Snapshot handed to sink");
    if snapshot.mode == SaveMode::Disconnect {
        info!(user = %user.username, "Final save received, closing session");
        session.disconnect();
    }
    Ok(())
}

async fn handle_request_save_part(
    _ctx: Arc<ServerContext>,
    session: Arc<Session>,
    _packet: Packet,
) -> Result<()> {
    session.require_user()?;
    transfer::send_next_part(&session).await?;
    Ok(())
}
