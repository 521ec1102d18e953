//! # Core Protocol Components
//!
//! Low-level framing of envelopes over byte streams.
//!
//! ## Wire Format
//! ```text
//! [Length(2, big-endian)] [Envelope(Length)]
//! ```
//!
//! ## Security
//! - Maximum frame size: 65535 bytes, the most a 16-bit prefix can declare
//! - Unknown kinds and invalid payloads are rejected as malformed, never panicked on
//! - Nested length fields are bounded by the frame size before allocation

pub mod codec;
