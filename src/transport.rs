//! The seam between the session core and a live socket.
//!
//! The session never touches the WebSocket directly. While a connection is
//! open it holds a `Transport` that accepts encoded text frames; the driver
//! in `connection` backs it with a channel drained by the socket writer.

use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection behind this transport is gone.
    #[error("transport is closed")]
    Closed,
    /// The transport refused the frame for another reason.
    #[error("send failed: {0}")]
    Send(String),
}

/// Outbound half of an open connection.
pub trait Transport: Send {
    /// Whether frames handed over now can still reach the socket.
    fn is_open(&self) -> bool;

    /// Hand one encoded frame to the socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the frame cannot be accepted; the
    /// caller keeps ownership of the payload and may queue it.
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;
}

/// Transport feeding an unbounded channel read by the socket writer task.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.tx
            .send(text.to_owned())
            .map_err(|_| TransportError::Closed)
    }
}
