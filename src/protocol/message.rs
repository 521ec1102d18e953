//! # Protocol Messages
//!
//! The envelope exchanged on the wire. Each variant is one envelope kind and
//! carries its own typed payload, so a payload can never be read as the wrong
//! structure. On the wire the variant index is the kind tag (see
//! [`crate::core::codec`]).

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::pow::{MAX_DIFFICULTY, SEED_LEN};
use serde::{Deserialize, Serialize};

/// Prefix of the text carried by a successful [`Message::Result`]
pub const QUOTE_PREFIX: &str = "QUOTE: ";

/// Longest solution string accepted from a client.
/// A `u64` counter in hex never exceeds 16 characters.
pub const MAX_SOLUTION_LEN: usize = 64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Server → client: random seed and required number of leading zero hex digits
    ChallengeRequest { data: Vec<u8>, complexity: u8 },

    /// Client → server: the solution token
    ChallengeResponse { text: String },

    /// Server → client: the granted resource
    Result { text: String },

    /// Server → client: human-readable failure reason
    Error { text: String },
}

/// Envelope kind tag, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    ChallengeRequest,
    ChallengeResponse,
    Result,
    Error,
}

impl MessageKind {
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::ChallengeRequest => "ChallengeRequest",
            MessageKind::ChallengeResponse => "ChallengeResponse",
            MessageKind::Result => "Result",
            MessageKind::Error => "Error",
        }
    }
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::ChallengeRequest { .. } => MessageKind::ChallengeRequest,
            Message::ChallengeResponse { .. } => MessageKind::ChallengeResponse,
            Message::Result { .. } => MessageKind::Result,
            Message::Error { .. } => MessageKind::Error,
        }
    }

    pub fn challenge_response(solution: impl Into<String>) -> Self {
        Message::ChallengeResponse {
            text: solution.into(),
        }
    }

    pub fn quote(quote: &str) -> Self {
        Message::Result {
            text: format!("{QUOTE_PREFIX}{quote}"),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Message::Error {
            text: reason.into(),
        }
    }

    /// Check the payload invariants that serde alone cannot express.
    ///
    /// # Errors
    /// Returns `ProtocolError::MalformedMessage` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        match self {
            Message::ChallengeRequest { data, complexity } => {
                if data.len() != SEED_LEN {
                    return Err(ProtocolError::MalformedMessage(format!(
                        "challenge seed must be {SEED_LEN} bytes, got {}",
                        data.len()
                    )));
                }
                if *complexity > MAX_DIFFICULTY {
                    return Err(ProtocolError::MalformedMessage(format!(
                        "challenge complexity {complexity} exceeds {MAX_DIFFICULTY}"
                    )));
                }
                Ok(())
            }
            Message::ChallengeResponse { text } if text.len() > MAX_SOLUTION_LEN => {
                Err(ProtocolError::MalformedMessage(format!(
                    "solution longer than {MAX_SOLUTION_LEN} bytes"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Build the error reply the server sends for a payload that failed to parse
    pub fn malformed_reply(err: &ProtocolError) -> Self {
        Message::error(format!("{}: {err}", constants::ERR_WRONG_FORMAT))
    }
}
