//! Property-based tests using proptest
//!
//! These tests check framing, compression, part splitting and credential
//! rules across randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use world_session::config::{AccessConfig, MAX_TYPE_NAME_LEN};
use world_session::core::packet::Packet;
use world_session::protocol::handshake::credentials_are_well_formed;
use world_session::protocol::message::LoginData;
use world_session::transfer::TransferState;
use world_session::utils::compression::{compress, decompress, CompressionKind};

fn any_kind() -> impl Strategy<Value = CompressionKind> {
    prop_oneof![
        Just(CompressionKind::None),
        Just(CompressionKind::Lz4),
        Just(CompressionKind::Zstd),
    ]
}

// Property: any named packet survives framing
proptest! {
    #[test]
    fn prop_packet_roundtrip(
        name in "[A-Za-z]{1,40}",
        contents in prop::collection::vec(any::<u8>(), 0..10000),
    ) {
        let packet = Packet::new(name.clone(), contents.clone());
        let decoded = Packet::from_bytes(&packet.to_bytes()).expect("frame should decode");

        prop_assert_eq!(decoded.type_name(), name.as_str());
        prop_assert_eq!(decoded.contents(), contents.as_slice());
    }
}

// Property: a frame cut short never decodes
proptest! {
    #[test]
    fn prop_truncated_frame_rejected(
        contents in prop::collection::vec(any::<u8>(), 1..2000),
        cut in 1usize..2000,
    ) {
        let frame = Packet::new("Part", contents).to_bytes();
        let keep = frame.len().saturating_sub(cut.min(frame.len() - 1));
        prop_assert!(Packet::from_bytes(&frame[..keep]).is_err());
    }
}

// Property: every compression kind restores its input, including the empty input
proptest! {
    #[test]
    fn prop_compression_roundtrip(
        kind in any_kind(),
        data in prop_oneof![
            Just(Vec::new()),
            prop::collection::vec(any::<u8>(), 1..2),
            prop::collection::vec(any::<u8>(), 0..50000),
            prop::collection::vec(Just(7u8), 65535..65538),
        ],
    ) {
        let compressed = compress(&data, &kind).expect("compression should not fail");
        let restored = decompress(&compressed, &kind).expect("decompression should not fail");
        prop_assert_eq!(restored, data);
    }
}

// Property: garbage never panics the decompressors
proptest! {
    #[test]
    fn prop_decompress_garbage_does_not_panic(data in prop::collection::vec(any::<u8>(), 0..1000)) {
        let _ = decompress(&data, &CompressionKind::Lz4);
        let _ = decompress(&data, &CompressionKind::Zstd);
    }
}

// Property: parts tile the artifact exactly, and only the final part is last
proptest! {
    #[test]
    fn prop_parts_cover_artifact(total in 0u64..5_000_000, part_size in 1usize..1_048_577) {
        let mut state = TransferState::for_artifact("artifact", total, part_size);
        let expected_parts = total.div_ceil(part_size as u64).max(1);
        prop_assert_eq!(u64::from(state.total_parts()), expected_parts);

        let mut covered = 0u64;
        let mut lasts = 0;
        while state.advance() {
            let len = state.current_part_len();
            prop_assert!(len <= part_size);
            covered += len as u64;
            if state.is_last_part() {
                lasts += 1;
            }
        }

        prop_assert_eq!(covered, total);
        prop_assert_eq!(lasts, 1);
        prop_assert_eq!(u64::from(state.current_part()), expected_parts);
    }
}

// Property: accepted usernames are always safe to use as file names
proptest! {
    #[test]
    fn prop_accepted_usernames_are_path_safe(name in "\\PC{0,40}", password in "[a-z0-9]{1,20}") {
        let access = AccessConfig::default();
        let data = LoginData::credentials(name.clone(), password, "1");

        if credentials_are_well_formed(&data, &access) {
            prop_assert!(!name.contains('/'));
            prop_assert!(!name.contains('\\'));
            prop_assert!(!name.starts_with('.'));
            prop_assert!(!name.chars().any(char::is_whitespace));
            prop_assert!(name.chars().count() <= access.max_username_len);
        }
    }
}

#[test]
fn test_longest_type_name_frames() {
    let name = "N".repeat(MAX_TYPE_NAME_LEN);
    let packet = Packet::signal(name.clone());
    let decoded = Packet::from_bytes(&packet.to_bytes()).unwrap();
    assert_eq!(decoded.type_name(), name);

    let too_long = Packet::signal("N".repeat(MAX_TYPE_NAME_LEN + 1));
    assert!(too_long.validate().is_err());
}
