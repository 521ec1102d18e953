//! # pow-gateway
//!
//! A server that hands out a scarce resource (a quote) only after the client
//! proves it spent real computation, via a proof-of-work challenge-response
//! handshake over a length-prefixed binary protocol.
//!
//! ## Layers
//! - [`core`]: envelope framing codec (2-byte big-endian length prefix)
//! - [`protocol`]: envelope types, proof-of-work engine, handshake logic
//! - [`transport`]: per-connection session with a fixed deadline
//! - [`service`]: the quote server and client
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, metrics
//!
//! ## Example
//! ```rust,no_run
//! use pow_gateway::config::NetworkConfig;
//! use pow_gateway::service::{QuoteClient, QuoteServer};
//!
//! # async fn run() -> pow_gateway::error::Result<()> {
//! let config = NetworkConfig::from_env()?;
//! let server = QuoteServer::from_config(config.server.clone())?.bind().await?;
//!
//! let quote = QuoteClient::new(config.client).request_quote().await?;
//! println!("{quote}");
//!
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
