//! # Transport Layer
//!
//! Connection-scoped plumbing between a byte stream and the handshake.
//!
//! ## Components
//! - **Session**: a framed stream plus the deadline that bounds all of its I/O

pub mod session;
