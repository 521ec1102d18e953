#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for the envelope codec and the proof-of-work engine
//! Covers boundary sizes, partial input, and inputs a hostile peer could send

use bytes::BytesMut;
use pow_gateway::core::codec::{
    decode_message, encode_message, EnvelopeCodec, HEADER_SIZE, MAX_FRAME_SIZE,
};
use pow_gateway::error::ProtocolError;
use pow_gateway::protocol::message::{Message, MAX_SOLUTION_LEN};
use pow_gateway::protocol::pow::{self, MAX_DIFFICULTY, SEED_LEN};
use tokio_util::codec::{Decoder, Encoder};

/// Variant tag (4) plus string length (8) under fixint encoding
const TEXT_OVERHEAD: usize = 12;

fn encode(msg: Message) -> BytesMut {
    let mut buf = BytesMut::new();
    EnvelopeCodec.encode(msg, &mut buf).unwrap();
    buf
}

// ============================================================================
// CODEC EDGE CASES
// ============================================================================

#[test]
fn test_empty_text_roundtrip() {
    let mut buf = encode(Message::error(""));
    let decoded = EnvelopeCodec.decode(&mut buf).unwrap();
    assert_eq!(decoded, Some(Message::error("")));
    assert!(buf.is_empty());
}

#[test]
fn test_largest_frame_fits() {
    let text = "q".repeat(MAX_FRAME_SIZE - TEXT_OVERHEAD);
    let mut buf = encode(Message::Result { text: text.clone() });
    assert_eq!(buf.len(), HEADER_SIZE + MAX_FRAME_SIZE);
    assert_eq!(&buf[..2], &[0xFFu8, 0xFF]);

    match EnvelopeCodec.decode(&mut buf).unwrap() {
        Some(Message::Result { text: decoded }) => assert_eq!(decoded, text),
        other => panic!("Unexpected decode result: {other:?}"),
    }
}

#[test]
fn test_one_byte_over_limit_rejected() {
    let text = "q".repeat(MAX_FRAME_SIZE - TEXT_OVERHEAD + 1);
    let mut buf = BytesMut::new();
    let result = EnvelopeCodec.encode(Message::Result { text }, &mut buf);

    assert!(matches!(
        result,
        Err(ProtocolError::OversizedPacket(n)) if n == MAX_FRAME_SIZE + 1
    ));
    assert!(buf.is_empty(), "Nothing may be written for a rejected frame");
}

#[test]
fn test_byte_by_byte_delivery() {
    let msg = Message::ChallengeRequest {
        data: vec![0x5A; SEED_LEN],
        complexity: 5,
    };
    let wire = encode(msg.clone());

    let mut codec = EnvelopeCodec;
    let mut buf = BytesMut::new();
    for (i, byte) in wire.iter().enumerate() {
        buf.extend_from_slice(&[*byte]);
        let decoded = codec.decode(&mut buf).unwrap();
        if i + 1 < wire.len() {
            assert!(decoded.is_none(), "Frame surfaced early at byte {i}");
        } else {
            assert_eq!(decoded, Some(msg.clone()));
        }
    }
}

#[test]
fn test_back_to_back_frames() {
    let first = Message::challenge_response("1f");
    let second = Message::quote("Patience is bitter, but its fruit is sweet.");

    let mut buf = encode(first.clone());
    buf.extend_from_slice(&encode(second.clone()));

    let mut codec = EnvelopeCodec;
    assert_eq!(codec.decode(&mut buf).unwrap(), Some(first));
    assert_eq!(codec.decode(&mut buf).unwrap(), Some(second));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

#[test]
fn test_zero_length_frame_is_malformed() {
    let mut buf = BytesMut::from(&[0x00, 0x00][..]);
    assert!(matches!(
        EnvelopeCodec.decode(&mut buf),
        Err(ProtocolError::MalformedMessage(_))
    ));
    assert!(buf.is_empty(), "The bad frame must be consumed");
}

#[test]
fn test_garbage_frame_does_not_poison_stream() {
    let mut buf = BytesMut::from(&[0x00, 0x03, 0xDE, 0xAD, 0xBE][..]);
    buf.extend_from_slice(&encode(Message::error("still here")));

    let mut codec = EnvelopeCodec;
    assert!(codec.decode(&mut buf).is_err());
    assert_eq!(
        codec.decode(&mut buf).unwrap(),
        Some(Message::error("still here"))
    );
}

#[test]
fn test_string_length_beyond_body_is_malformed() {
    // Error variant claiming a 1 GiB string inside a 12-byte body
    let mut body = 3u32.to_le_bytes().to_vec();
    body.extend_from_slice(&(1u64 << 30).to_le_bytes());
    assert!(matches!(
        decode_message(&body),
        Err(ProtocolError::MalformedMessage(_))
    ));
}

#[test]
fn test_invalid_utf8_text_is_malformed() {
    let mut body = 1u32.to_le_bytes().to_vec();
    body.extend_from_slice(&2u64.to_le_bytes());
    body.extend_from_slice(&[0xC3, 0x28]);
    assert!(matches!(
        decode_message(&body),
        Err(ProtocolError::MalformedMessage(_))
    ));
}

#[test]
fn test_short_seed_is_malformed() {
    let body = encode_message(&Message::ChallengeRequest {
        data: vec![1; SEED_LEN - 1],
        complexity: 1,
    })
    .unwrap();
    assert!(matches!(
        decode_message(&body),
        Err(ProtocolError::MalformedMessage(_))
    ));
}

#[test]
fn test_complexity_above_max_is_malformed() {
    let body = encode_message(&Message::ChallengeRequest {
        data: vec![1; SEED_LEN],
        complexity: MAX_DIFFICULTY + 1,
    })
    .unwrap();
    assert!(decode_message(&body).is_err());
}

#[test]
fn test_solution_length_limit() {
    let at_limit =
        encode_message(&Message::challenge_response("a".repeat(MAX_SOLUTION_LEN))).unwrap();
    assert!(decode_message(&at_limit).is_ok());

    let over =
        encode_message(&Message::challenge_response("a".repeat(MAX_SOLUTION_LEN + 1))).unwrap();
    assert!(decode_message(&over).is_err());
}

// ============================================================================
// PROOF-OF-WORK EDGE CASES
// ============================================================================

#[test]
fn test_max_difficulty_rejects_everything_practical() {
    let seed = [0u8; SEED_LEN];
    for candidate in ["0", "1", "ff", "deadbeef"] {
        assert!(!pow::validate(&seed, MAX_DIFFICULTY, candidate));
    }
}

#[test]
fn test_non_hex_solution_accepted_if_hash_qualifies() {
    // The verifier only looks at the hash, not at the shape of the token
    let seed = [9u8; SEED_LEN];
    assert!(pow::validate(&seed, 0, "not hex at all"));
}
