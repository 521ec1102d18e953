//! # Error Types
//!
//! Error handling for the proof-of-work gateway.
//!
//! Every fallible operation in the crate returns [`Result`], whose error is a
//! [`ProtocolError`]. Variants are grouped the same way the handshake treats them:
//!
//! ## Error Categories
//! - **Transport**: I/O failures, closed connections, elapsed deadlines
//! - **Protocol**: malformed frames or payloads, unexpected message kinds, rejections
//! - **Computation**: a proof-of-work search that was cancelled or exhausted
//! - **Configuration**: invalid settings detected at startup
//!
//! Transport and protocol errors are contained to the connection they occur on;
//! the server logs them and keeps accepting.
//!
//! ## Example Usage
//! ```rust
//! use pow_gateway::error::{ProtocolError, Result};
//!
//! fn check_len(len: usize) -> Result<()> {
//!     if len > u16::MAX as usize {
//!         return Err(ProtocolError::OversizedPacket(len));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_len(10).is_ok());
//! assert!(check_len(70_000).is_err());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants shared between the server replies and logs.
pub mod constants {
    /// Reply sent when the peer answers with anything but a challenge response
    pub const ERR_WRONG_RESPONSE: &str = "wrong challenge response";
    /// Reply prefix sent when the response payload does not parse
    pub const ERR_WRONG_FORMAT: &str = "wrong message format";
    /// Reply sent when the proof of work does not satisfy the difficulty
    pub const ERR_INVALID_PROOF: &str = "invalid proof of work";

    pub const ERR_ENTROPY: &str = "Failed to draw challenge seed from the OS random source";
    pub const ERR_NO_CHALLENGE: &str = "No outstanding challenge for this connection";
    pub const ERR_EMPTY_QUOTES: &str = "Quote corpus is empty";
    pub const ERR_SOLVER_TASK: &str = "Proof-of-work solver task failed";
}

/// Primary error type for all gateway operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessage {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Proof-of-work search cancelled")]
    ChallengeCancelled,

    #[error("Proof-of-work solution not found")]
    SolutionNotFound,

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether this error came from the connection itself rather than its content
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_) | ProtocolError::ConnectionClosed | ProtocolError::Timeout
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
