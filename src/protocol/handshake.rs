//! Proof-of-work handshake.
//!
//! The exchange is a single round:
//!
//! ```text
//! server                              client
//!   | -- ChallengeRequest{data, d} -->   |
//!   |                                    |  solve(data, d)
//!   | <-- ChallengeResponse{text} -----  |
//!   | -- Result{quote} | Error{why} -->  |
//! ```
//!
//! The server side is an explicit state machine ([`ServerHandshakeState`]) that
//! owns the connection's challenge and decides the reply. The client side is a
//! pair of step functions with no branching state. Neither side touches the
//! socket here; [`crate::service`] drives them over a [`crate::transport::session::Session`].

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{Message, MessageKind};
use crate::protocol::pow::{self, Challenge};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Server-side handshake states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    AwaitingAccept,
    ChallengeSent,
    AwaitingResponse,
    ResultSent,
    ErrorSent,
    Closed,
}

impl ServerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ServerState::ResultSent | ServerState::ErrorSent | ServerState::Closed
        )
    }
}

/// What the server decided about the client's response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Valid proof; the reply carries the quote
    Accepted,
    /// Wrong kind, malformed payload, or invalid proof; the reply carries the reason
    Rejected(String),
}

/// Server-side handshake state - one per connection
#[derive(Debug)]
pub struct ServerHandshakeState {
    state: ServerState,
    challenge: Option<Challenge>,
}

impl ServerHandshakeState {
    pub fn new() -> Self {
        Self {
            state: ServerState::AwaitingAccept,
            challenge: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// The outstanding challenge, if one was issued and not yet consumed
    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    /// Generate a fresh challenge and return the envelope announcing it.
    ///
    /// # Errors
    /// - `ProtocolError::HandshakeError` if a challenge was already issued
    /// - `ProtocolError::SecurityError` if no entropy is available
    #[instrument(skip(self))]
    pub fn issue_challenge(&mut self, difficulty: u8) -> Result<Message> {
        if self.state != ServerState::AwaitingAccept {
            return Err(ProtocolError::HandshakeError(format!(
                "cannot issue a challenge in state {:?}",
                self.state
            )));
        }

        let challenge = pow::generate_challenge(difficulty)?;
        let msg = challenge.to_message();
        self.challenge = Some(challenge);
        self.state = ServerState::ChallengeSent;

        debug!("Server issued challenge");
        Ok(msg)
    }

    /// Record that the challenge is on the wire and a response is awaited
    pub fn challenge_delivered(&mut self) {
        if self.state == ServerState::ChallengeSent {
            self.state = ServerState::AwaitingResponse;
        }
    }

    /// Judge the client's reply and produce the envelope to send back.
    ///
    /// The challenge is consumed whatever the outcome, so a second response on
    /// the same connection can never be validated. `quote` is only called on
    /// success.
    ///
    /// # Errors
    /// Returns `ProtocolError::HandshakeError` if no challenge is outstanding.
    #[instrument(skip(self, msg, quote), fields(kind = msg.kind().name()))]
    pub fn on_response<F>(&mut self, msg: Message, quote: F) -> Result<(Verdict, Message)>
    where
        F: FnOnce() -> String,
    {
        if self.state != ServerState::AwaitingResponse {
            return Err(ProtocolError::HandshakeError(format!(
                "unexpected response in state {:?}",
                self.state
            )));
        }
        let challenge = self.challenge.take().ok_or_else(|| {
            ProtocolError::HandshakeError(constants::ERR_NO_CHALLENGE.into())
        })?;

        let solution = match msg {
            Message::ChallengeResponse { text } => text,
            other => {
                warn!(kind = other.kind().name(), "Client replied with wrong message kind");
                return Ok(self.reject(constants::ERR_WRONG_RESPONSE.to_string()));
            }
        };

        if !challenge.verify(&solution) {
            debug!("Client solution failed validation");
            return Ok(self.reject(constants::ERR_INVALID_PROOF.to_string()));
        }

        self.state = ServerState::ResultSent;
        debug!("Client solution accepted");
        Ok((Verdict::Accepted, Message::quote(&quote())))
    }

    /// Turn a response that could not be decoded into the error reply.
    ///
    /// Only protocol errors get a reply; transport errors leave nothing to
    /// answer and just close the handshake.
    pub fn on_malformed(&mut self, err: &ProtocolError) -> Option<(Verdict, Message)> {
        self.challenge = None;
        match err {
            ProtocolError::MalformedMessage(_) => {
                let reply = Message::malformed_reply(err);
                let reason = match &reply {
                    Message::Error { text } => text.clone(),
                    _ => err.to_string(),
                };
                self.state = ServerState::ErrorSent;
                Some((Verdict::Rejected(reason), reply))
            }
            _ => {
                self.state = ServerState::Closed;
                None
            }
        }
    }

    pub fn close(&mut self) {
        self.challenge = None;
        self.state = ServerState::Closed;
    }

    fn reject(&mut self, reason: String) -> (Verdict, Message) {
        self.state = ServerState::ErrorSent;
        (Verdict::Rejected(reason.clone()), Message::error(reason))
    }
}

impl Default for ServerHandshakeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Client step 1: solve the received challenge and build the response.
///
/// # Errors
/// - `ProtocolError::UnexpectedMessage` if `msg` is not a `ChallengeRequest`
/// - `ProtocolError::MalformedMessage` if the challenge fails validation
/// - `ProtocolError::ChallengeCancelled` if `deadline` passes mid-search
#[instrument(skip(msg), fields(kind = msg.kind().name()))]
pub async fn client_answer_challenge(msg: Message, deadline: Instant) -> Result<Message> {
    msg.validate()?;
    let (data, complexity) = match msg {
        Message::ChallengeRequest { data, complexity } => (data, complexity),
        other => {
            return Err(ProtocolError::UnexpectedMessage {
                expected: MessageKind::ChallengeRequest.name(),
                actual: other.kind().name(),
            })
        }
    };

    let solution = pow::solve_within(data, complexity, deadline).await?;
    debug!(difficulty = complexity, "Client solved challenge");
    Ok(Message::challenge_response(solution))
}

/// Client step 2: extract the quote from the server's final envelope.
///
/// # Errors
/// - `ProtocolError::Rejected` carrying the server's reason for an `Error` envelope
/// - `ProtocolError::UnexpectedMessage` for any other kind
pub fn client_accept_result(msg: Message) -> Result<String> {
    match msg {
        Message::Result { text } => Ok(text),
        Message::Error { text } => Err(ProtocolError::Rejected(text)),
        other => Err(ProtocolError::UnexpectedMessage {
            expected: MessageKind::Result.name(),
            actual: other.kind().name(),
        }),
    }
}
