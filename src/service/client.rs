//! Quote client.
//!
//! Connects, answers the server's challenge, and returns the granted quote.
//! Every step is fail-fast: a transport error, an unexpected envelope, or a
//! server `Error` ends the attempt. There are no retries and no reconnects.

use crate::config::ClientConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::{client_accept_result, client_answer_challenge};
use crate::transport::session::Session;
use crate::utils::metrics::Timer;
use crate::utils::timeout::with_timeout_error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct QuoteClient {
    config: ClientConfig,
}

impl QuoteClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Connect to the configured server and run one handshake.
    ///
    /// The connect is bounded by `connection_timeout`; everything after it,
    /// solving included, by one `handshake_timeout`.
    #[instrument(skip(self), fields(server = %self.config.address))]
    pub async fn request_quote(&self) -> Result<String> {
        let address = self.config.address.as_str();
        let stream = with_timeout_error(
            async { Ok::<_, ProtocolError>(TcpStream::connect(address).await?) },
            self.config.connection_timeout,
        )
        .await?;
        info!("Client connected");

        let deadline = Instant::now() + self.config.handshake_timeout;
        run_client_handshake(stream, deadline).await
    }
}

/// Drive the client side of the handshake over any byte stream
pub async fn run_client_handshake<S>(stream: S, deadline: Instant) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(stream, deadline);

    let challenge = session.recv().await?;
    // A late challenge can still be read from the buffer; don't start a search
    // whose answer could never be sent in time
    if session.is_expired() {
        return Err(ProtocolError::Timeout);
    }

    let timer = Timer::start("pow_solve");
    let response = client_answer_challenge(challenge, session.deadline()).await?;
    info!(elapsed_ms = timer.elapsed_ms() as u64, "Proof of work solved");

    session.send(response).await?;
    let result = session.recv().await?;
    client_accept_result(result)
}
