use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tokio_util::codec::{Decoder, Encoder};
use world_session::core::codec::PacketCodec;
use world_session::core::packet::Packet;
use world_session::protocol::message::{packet_names, FileTransferData, SaveMode};

#[allow(clippy::unwrap_used)]
fn bench_packet_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode_decode");
    let payload_sizes = [64usize, 512, 4096, 65536, 1024 * 1024];

    for &size in &payload_sizes {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || Packet::new(packet_names::RECEIVE_SAVE_PART, vec![0u8; size]),
                |packet| {
                    let mut buf = BytesMut::with_capacity(size + 64);
                    let mut codec = PacketCodec;
                    codec.encode(packet, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("decode_{size}b"), |b| {
            let mut encoded = BytesMut::new();
            PacketCodec
                .encode(Packet::new(packet_names::RECEIVE_SAVE_PART, vec![0u8; size]), &mut encoded)
                .unwrap();
            b.iter_batched(
                || encoded.clone(),
                |mut buf| {
                    let decoded = PacketCodec.decode(&mut buf).unwrap();
                    assert!(decoded.is_some());
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_transfer_part_payload(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer_part_payload");
    let part = FileTransferData {
        file_size: 10 * 1024 * 1024,
        file_parts: 10,
        file_bytes: vec![0xAB; 1024 * 1024],
        is_last_part: false,
        additional_instructions: SaveMode::Autosave.as_instruction(),
    };
    group.throughput(Throughput::Bytes(part.file_bytes.len() as u64));

    group.bench_function("serialize_1mb_part", |b| {
        b.iter(|| Packet::from_payload(packet_names::RECEIVE_SAVE_PART, &part).unwrap())
    });
    group.bench_function("deserialize_1mb_part", |b| {
        let packet = Packet::from_payload(packet_names::RECEIVE_SAVE_PART, &part).unwrap();
        b.iter(|| {
            let decoded: FileTransferData = packet.decode().unwrap();
            assert_eq!(decoded.file_parts, 10);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_packet_encode_decode, bench_transfer_part_payload);
criterion_main!(benches);
