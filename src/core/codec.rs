//! Tokio codec framing [`Packet`]s over a byte stream.

use crate::core::packet::{parse_header, Packet};
use crate::error::ProtocolError;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// Length-delimited framing for named packets
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match parse_header(&src[..])? {
            Some(header) => header,
            None => return Ok(None),
        };

        let frame_len = header.frame_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        Packet::from_frame(&frame[..], header).map(Some)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.validate()?;
        item.write_to(dst);
        Ok(())
    }
}
