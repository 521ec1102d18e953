//! # Protocol Layer
//!
//! Message types, the proof-of-work engine, and the handshake built on them.
//!
//! ## Components
//! - **Message**: the envelope sum type exchanged on the wire
//! - **PoW**: challenge generation, solving, and validation
//! - **Handshake**: server state machine and client steps
//!
//! ## Handshake Flow
//! ```text
//! Server → Client: ChallengeRequest { data, complexity }
//! Client → Server: ChallengeResponse { text }
//! Server → Client: Result { "QUOTE: ..." } | Error { reason }
//! ```

pub mod handshake;
pub mod message;
pub mod pow;
