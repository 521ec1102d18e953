//! # Services
//!
//! The two ends of the gateway, built on the handshake and the session.
//!
//! ## Components
//! - **Server**: accept loop, per-connection handlers, bounded shutdown drain
//! - **Client**: connect, solve, and return the granted quote
//! - **Quotes**: the read-only quote corpus

pub mod client;
pub mod quotes;
pub mod server;

pub use client::QuoteClient;
pub use quotes::QuoteBook;
pub use server::{QuoteServer, QuoteSource, ServerHandle};
