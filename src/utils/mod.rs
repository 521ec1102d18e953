//! # Utility Modules
//!
//! Supporting utilities for logging, metrics, and deadlines.
//!
//! ## Components
//! - **Logging**: tracing-subscriber setup from configuration
//! - **Metrics**: Thread-safe observability counters
//! - **Timeout**: Deadline wrappers that map elapsed timers to `ProtocolError::Timeout`

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
