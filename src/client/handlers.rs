use crate::client::{ClientContext, ClientEvent};
use crate::core::packet::Packet;
use crate::error::Result;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::{packet_names, FileTransferData, LoginData, PlayerRecountData, Rejection, SiteData};
use crate::server::handlers::decode_payload;
use crate::session::Session;
use crate::transfer;
use std::sync::Arc;
use tracing::{debug, info};

pub(super) fn client_dispatcher() -> Dispatcher<ClientContext> {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register(packet_names::LOGIN_RESPONSE, handle_login_response)
        .register(packet_names::PLAYER_RECOUNT, handle_player_recount)
        .register(packet_names::SITE, handle_site)
        .register(packet_names::REJECTION, handle_rejection)
        .register(packet_names::RECEIVE_SAVE_PART, handle_receive_save_part)
        .register(packet_names::REQUEST_SAVE_PART, handle_request_save_part);
    dispatcher
}

async fn handle_login_response(ctx: Arc<ClientContext>, _session: Arc<Session>, packet: Packet) -> Result<()> {
    let response: LoginData = decode_payload(&packet)?;
    info!(response = ?response.try_response, "Login response");
    ctx.emit(ClientEvent::LoginResponse(response));
    Ok(())
}

async fn handle_player_recount(ctx: Arc<ClientContext>, _session: Arc<Session>, packet: Packet) -> Result<()> {
    let recount: PlayerRecountData = decode_payload(&packet)?;
    debug!(players = recount.current_players, "Player recount");
    ctx.emit(ClientEvent::PlayerRecount(recount));
    Ok(())
}

async fn handle_site(ctx: Arc<ClientContext>, _session: Arc<Session>, packet: Packet) -> Result<()> {
    ctx.emit(ClientEvent::Site(decode_payload::<SiteData>(&packet)?));
    Ok(())
}

async fn handle_rejection(ctx: Arc<ClientContext>, _session: Arc<Session>, packet: Packet) -> Result<()> {
    let rejection: Rejection = decode_payload(&packet)?;
    info!(%rejection, "Server rejected request");
    ctx.emit(ClientEvent::Rejected(rejection));
    Ok(())
}

async fn handle_receive_save_part(ctx: Arc<ClientContext>, session: Arc<Session>, packet: Packet) -> Result<()> {
    let part: FileTransferData = decode_payload(&packet)?;
    let destination = ctx.download_path();
    if let Some(snapshot) = transfer::receive_part(&session, part, &destination, &ctx.transfer).await? {
        let outcome = ctx.sink.try_apply(&snapshot);
        debug!(outcome = ?outcome, "Snapshot handed to sink");
        ctx.emit(ClientEvent::SnapshotReceived(snapshot));
    }
    Ok(())
}

async fn handle_request_save_part(ctx: Arc<ClientContext>, session: Arc<Session>, _packet: Packet) -> Result<()> {
    let progress = transfer::send_next_part(&session).await?;
    ctx.upload_progress(&session, progress);
    Ok(())
}
