//! Per-connection session.
//!
//! A [`Session`] owns one stream framed with [`EnvelopeCodec`] and a single
//! absolute deadline. Every send and receive is bounded by that deadline, and
//! nothing on the session can move it, so a stalling peer cannot buy itself
//! more time by trickling bytes.

use crate::core::codec::EnvelopeCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;
use crate::utils::timeout::with_deadline;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

/// Initial capacity of the framing buffers; they grow up to one full frame
const INITIAL_BUFFER_CAPACITY: usize = 4096;

pub struct Session<S> {
    framed: Framed<S, EnvelopeCodec>,
    deadline: Instant,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, deadline: Instant) -> Self {
        Self {
            framed: Framed::with_capacity(stream, EnvelopeCodec, INITIAL_BUFFER_CAPACITY),
            deadline,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Encode and flush one envelope
    #[instrument(skip(self, msg), fields(kind = msg.kind().name()), level = "debug")]
    pub async fn send(&mut self, msg: Message) -> Result<()> {
        let framed = &mut self.framed;
        with_deadline(framed.send(msg), self.deadline).await?;
        debug!("Envelope sent");
        Ok(())
    }

    /// Wait for the next complete envelope
    #[instrument(skip(self), level = "debug")]
    pub async fn recv(&mut self) -> Result<Message> {
        let framed = &mut self.framed;
        let msg = with_deadline(
            async {
                framed
                    .next()
                    .await
                    .ok_or(ProtocolError::ConnectionClosed)?
            },
            self.deadline,
        )
        .await?;
        debug!(kind = msg.kind().name(), "Envelope received");
        Ok(msg)
    }

    /// Flush anything pending and shut down the write half
    pub async fn close(mut self) -> Result<()> {
        let framed = &mut self.framed;
        with_deadline(framed.close(), self.deadline).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_send_recv_over_duplex() {
        let (a, b) = tokio::io::duplex(1024);
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut left = Session::new(a, deadline);
        let mut right = Session::new(b, deadline);

        left.send(Message::challenge_response("1a")).await.unwrap();
        assert_eq!(
            right.recv().await.unwrap(),
            Message::challenge_response("1a")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_fixed_at_creation() {
        let (a, _b) = tokio::io::duplex(1024);
        let deadline = Instant::now() + Duration::from_millis(100);
        let session = Session::new(a, deadline);
        assert_eq!(session.deadline(), deadline);
        assert!(!session.is_expired());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.is_expired());
        assert_eq!(session.deadline(), deadline);
    }

    #[tokio::test]
    async fn test_length_prefix_split_across_writes() {
        let (mut raw, b) = tokio::io::duplex(1024);
        let mut session = Session::new(b, Instant::now() + Duration::from_secs(5));

        let body = crate::core::codec::encode_message(&Message::error("late")).unwrap();
        let reader = tokio::spawn(async move { session.recv().await });

        raw.write_all(&[(body.len() >> 8) as u8]).await.unwrap();
        raw.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        raw.write_all(&[body.len() as u8]).await.unwrap();
        raw.write_all(&body).await.unwrap();

        assert_eq!(reader.await.unwrap().unwrap(), Message::error("late"));
    }

    #[tokio::test]
    async fn test_truncated_frame_times_out() {
        let (mut raw, b) = tokio::io::duplex(1024);
        let mut session = Session::new(b, Instant::now() + Duration::from_millis(100));

        // Declare 100 bytes, deliver 3, then go quiet without closing
        raw.write_all(&[0x00, 0x64, 1, 2, 3]).await.unwrap();

        let result = session.recv().await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
        drop(raw);
    }

    #[tokio::test]
    async fn test_peer_close_mid_frame_is_io_error() {
        let (mut raw, b) = tokio::io::duplex(1024);
        let mut session = Session::new(b, Instant::now() + Duration::from_secs(5));

        raw.write_all(&[0x00, 0x64, 1, 2, 3]).await.unwrap();
        drop(raw);

        let result = session.recv().await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }

    #[tokio::test]
    async fn test_clean_close_reports_connection_closed() {
        let (raw, b) = tokio::io::duplex(1024);
        let mut session = Session::new(b, Instant::now() + Duration::from_secs(5));
        drop(raw);
        assert!(matches!(
            session.recv().await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}
