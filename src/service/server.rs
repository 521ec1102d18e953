//! Quote server.
//!
//! One accept loop, one task per accepted connection. Each task owns its
//! socket, its framing buffers, and its challenge; the only shared state is the
//! read-only [`Shared`] block (difficulty, timeout, quote source, counters).
//!
//! Every connection gets a deadline of `accept time + pow_timeout`, applied to
//! all of its reads and writes. A handler that fails or panics is logged and
//! counted; the listener and the other connections carry on.
//!
//! Shutdown cancels the accept loop at once, then waits at most one
//! `pow_timeout` (plus a short grace) for in-flight handlers. Handlers are not cancelled; their own
//! deadlines already bound them.

use crate::config::ServerConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::{ServerHandshakeState, ServerState, Verdict};
use crate::service::quotes::QuoteBook;
use crate::transport::session::Session;
use crate::utils::metrics::{Metrics, MetricsSnapshot};
use futures::FutureExt;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) cannot spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Slack added to the drain window so a handler whose deadline lands on the
/// last tick of the window can still unwind and be counted
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Where granted quotes come from
pub trait QuoteSource: Send + Sync + 'static {
    fn pick(&self) -> String;
}

impl QuoteSource for QuoteBook {
    fn pick(&self) -> String {
        self.random().to_string()
    }
}

struct Shared {
    difficulty: u8,
    pow_timeout: Duration,
    quotes: Arc<dyn QuoteSource>,
    metrics: Arc<Metrics>,
}

pub struct QuoteServer {
    config: ServerConfig,
    quotes: Arc<dyn QuoteSource>,
    metrics: Arc<Metrics>,
}

impl QuoteServer {
    pub fn new(config: ServerConfig, quotes: impl QuoteSource) -> Self {
        Self {
            config,
            quotes: Arc::new(quotes),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Build a server whose corpus comes from `config.quotes_file` (or the built-in one)
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let quotes = QuoteBook::load(config.quotes_file.as_deref())?;
        Ok(Self::new(config, quotes))
    }

    /// Bind the configured address and start serving
    pub async fn bind(self) -> Result<ServerHandle> {
        let listener = TcpListener::bind(&self.config.address).await?;
        self.serve(listener)
    }

    /// Start serving on an already bound listener
    pub fn serve(self, listener: TcpListener) -> Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let shared = Arc::new(Shared {
            difficulty: self.config.pow_difficulty,
            pow_timeout: self.config.pow_timeout,
            quotes: self.quotes,
            metrics: self.metrics.clone(),
        });

        info!(
            address = %local_addr,
            difficulty = shared.difficulty,
            pow_timeout_ms = shared.pow_timeout.as_millis() as u64,
            "Quote server listening"
        );

        let accept_loop = tokio::spawn(accept_loop(
            listener,
            shared,
            shutdown.clone(),
            tracker.clone(),
        ));

        Ok(ServerHandle {
            local_addr,
            shutdown,
            tracker,
            accept_loop,
            drain_timeout: self.config.pow_timeout,
            metrics: self.metrics,
        })
    }
}

/// Running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    accept_loop: JoinHandle<()>,
    drain_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Connection handlers still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting, then drain in-flight connections. Every handler was
    /// accepted at most one `pow_timeout` ago and is bounded by its own
    /// deadline, so the wait lasts one window plus [`DRAIN_GRACE`] at most.
    /// Returns the final counters.
    pub async fn shutdown(self) -> MetricsSnapshot {
        // Every handler's deadline falls inside this window, including one
        // accepted in the same tick as the cancel
        let drain_deadline = Instant::now() + self.drain_timeout + DRAIN_GRACE;
        self.shutdown.cancel();
        if let Err(e) = self.accept_loop.await {
            error!(error = %e, "Accept loop ended abnormally");
        }

        self.tracker.close();
        if tokio::time::timeout_at(drain_deadline, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.tracker.len(),
                "Drain window elapsed with connections still open"
            );
        } else {
            info!("All connections closed, shutting down");
        }

        self.metrics.log_metrics();
        self.metrics.snapshot()
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutting down server. Waiting for connections to close...");
                break;
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        // The budget starts at accept and is never refreshed
                        let deadline = Instant::now() + shared.pow_timeout;
                        let span = info_span!("connection", %peer);
                        tracker.spawn(
                            guarded_connection(stream, deadline, shared.clone()).instrument(span),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                        shared.metrics.connection_error();
                        if back_off(&shutdown).await {
                            info!("Shutting down server. Waiting for connections to close...");
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Sleep for [`ACCEPT_BACKOFF`] unless shutdown arrives first; true on shutdown
async fn back_off(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => false,
    }
}

/// Run one handler and contain whatever it does
async fn guarded_connection(stream: TcpStream, deadline: Instant, shared: Arc<Shared>) {
    shared.metrics.connection_established();
    debug!("New connection established");

    let outcome = AssertUnwindSafe(handle_connection(stream, deadline, &shared))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(state)) => debug!(state = ?state, "Connection closed"),
        Ok(Err(e)) => {
            match e {
                ProtocolError::Timeout => shared.metrics.timeout(),
                ref e if e.is_transport() => shared.metrics.connection_error(),
                _ => {}
            }
            warn!(error = %e, "Connection handler failed");
        }
        Err(panic) => {
            shared.metrics.handler_panic();
            error!(panic = %panic_message(&*panic), "Connection handler panicked");
        }
    }

    shared.metrics.connection_closed();
}

#[instrument(skip_all)]
async fn handle_connection<S>(stream: S, deadline: Instant, shared: &Shared) -> Result<ServerState>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(stream, deadline);
    let mut handshake = ServerHandshakeState::new();

    let challenge = handshake.issue_challenge(shared.difficulty)?;
    session.send(challenge).await?;
    handshake.challenge_delivered();
    shared.metrics.challenge_issued();

    let (verdict, reply) = match session.recv().await {
        Ok(msg) => handshake.on_response(msg, || shared.quotes.pick())?,
        Err(err) => handshake.on_malformed(&err).ok_or(err)?,
    };

    match verdict {
        Verdict::Accepted => {
            shared.metrics.solution_accepted();
            session.send(reply).await?;
            info!("Quote granted");
        }
        Verdict::Rejected(reason) => {
            shared.metrics.solution_rejected();
            info!(reason = %reason, "Response rejected");
            if let Err(e) = session.send(reply).await {
                debug!(error = %e, "Could not deliver error reply");
            }
        }
    }

    if let Err(e) = session.close().await {
        debug!(error = %e, "Error closing connection");
    }

    let outcome = handshake.state();
    handshake.close();
    debug!(outcome = ?outcome, "Handshake finished");
    Ok(handshake.state())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::constants;
    use crate::protocol::message::Message;
    use crate::protocol::pow;

    fn shared(difficulty: u8) -> Shared {
        Shared {
            difficulty,
            pow_timeout: Duration::from_secs(5),
            quotes: Arc::new(QuoteBook::from_text("Fortune favours the bold.").unwrap()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    #[tokio::test]
    async fn test_handler_ends_closed_after_result() {
        let (server_io, client_io) = tokio::io::duplex(4096);
        let deadline = Instant::now() + Duration::from_secs(5);
        let shared = shared(1);

        let client = async move {
            let mut session = Session::new(client_io, deadline);
            let (data, complexity) = match session.recv().await.unwrap() {
                Message::ChallengeRequest { data, complexity } => (data, complexity),
                other => panic!("Expected ChallengeRequest, got {other:?}"),
            };
            let solution = pow::solve(&data, complexity, &CancellationToken::new()).unwrap();
            session
                .send(Message::challenge_response(solution))
                .await
                .unwrap();
            session.recv().await.unwrap()
        };

        let (state, reply) = tokio::join!(handle_connection(server_io, deadline, &shared), client);
        assert_eq!(state.unwrap(), ServerState::Closed);
        assert_eq!(reply, Message::quote("Fortune favours the bold."));
        assert_eq!(shared.metrics.snapshot().solutions_accepted, 1);
    }

    #[tokio::test]
    async fn test_handler_ends_closed_after_error() {
        let (server_io, client_io) = tokio::io::duplex(4096);
        let deadline = Instant::now() + Duration::from_secs(5);
        let shared = shared(8);

        let client = async move {
            let mut session = Session::new(client_io, deadline);
            session.recv().await.unwrap();
            session
                .send(Message::challenge_response("not-a-valid-solution"))
                .await
                .unwrap();
            session.recv().await.unwrap()
        };

        let (state, reply) = tokio::join!(handle_connection(server_io, deadline, &shared), client);
        assert_eq!(state.unwrap(), ServerState::Closed);
        assert_eq!(reply, Message::error(constants::ERR_INVALID_PROOF));
        assert_eq!(shared.metrics.snapshot().solutions_rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_off_yields_to_shutdown() {
        let shutdown = CancellationToken::new();
        let started = Instant::now();
        assert!(!back_off(&shutdown).await);
        assert!(started.elapsed() >= ACCEPT_BACKOFF);

        shutdown.cancel();
        let started = Instant::now();
        assert!(back_off(&shutdown).await);
        assert!(started.elapsed() < ACCEPT_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_off_interrupted_midway() {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        assert!(back_off(&shutdown).await);
        assert!(started.elapsed() < ACCEPT_BACKOFF);
    }
}
