#![no_main]

use libfuzzer_sys::fuzz_target;
use world_session::protocol::message::{FileTransferData, LoginData, SiteData};
use world_session::Packet;

fuzz_target!(|data: &[u8]| {
    let Ok(packet) = Packet::from_bytes(data) else {
        return;
    };

    // Payload decoders see whatever a hostile peer put behind a valid header
    let _ = packet.decode::<LoginData>();
    let _ = packet.decode::<SiteData>();
    let _ = packet.decode::<FileTransferData>();
});
