//! # Envelope Codec
//!
//! Tokio codec framing [`Message`] envelopes over a byte stream.
//!
//! ## Wire Format
//! ```text
//! [Length(2, big-endian)] [bincode Message(Length)]
//! ```
//! The length covers only the serialized message. The bincode encoding of the
//! enum starts with a 4-byte little-endian variant index, which is the
//! envelope kind tag.
//!
//! ## Partial Reads
//! `decode` returns `Ok(None)` until the full length prefix and the full
//! payload are buffered, so a short read is never mistaken for a whole frame.
//! `Framed` keeps one `BytesMut` per direction for the lifetime of the
//! connection; every decode slices exactly `Length` bytes out of it.

use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;
use bincode::Options;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Length prefix size in bytes
pub const HEADER_SIZE: usize = 2;

/// Largest serialized message a 16-bit length prefix can describe
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// bincode configuration shared by both directions
fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Serialize a message body (without the length prefix)
pub fn encode_message(msg: &Message) -> Result<Vec<u8>> {
    wire_options()
        .serialize(msg)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

/// Parse and structurally validate a message body (without the length prefix)
pub fn decode_message(body: &[u8]) -> Result<Message> {
    // A hostile length field inside the payload must not drive a large allocation
    let msg: Message = wire_options()
        .with_limit(MAX_FRAME_SIZE as u64)
        .deserialize(body)
        .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;
    msg.validate()?;
    Ok(msg)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeCodec;

impl Decoder for EnvelopeCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let len = u16::from_be_bytes([src[0], src[1]]) as usize;
        let total = HEADER_SIZE + len;

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let body = src.split_to(len);
        decode_message(&body).map(Some)
    }
}

impl Encoder<Message> for EnvelopeCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        let size = wire_options()
            .serialized_size(&item)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))? as usize;

        if size > MAX_FRAME_SIZE {
            return Err(ProtocolError::OversizedPacket(size));
        }

        dst.reserve(HEADER_SIZE + size);
        dst.put_u16(size as u16);
        wire_options()
            .serialize_into(dst.writer(), &item)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;
        Ok(())
    }
}
