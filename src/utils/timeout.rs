//! Deadline and timeout helpers.
//!
//! Both helpers collapse an elapsed timer into `ProtocolError::Timeout` so
//! callers can use `?` on the inner result directly.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Time a server grants each connection to finish the whole handshake
pub const DEFAULT_POW_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a client allows for solving plus all socket I/O
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Time a client allows for the TCP connect
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `future` until it completes or `deadline` passes
pub async fn with_deadline<F, T>(future: F, deadline: Instant) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout_at(deadline, future)
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Run `future` for at most `duration`
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    with_deadline(future, Instant::now() + duration).await
}
