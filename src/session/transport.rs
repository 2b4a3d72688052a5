//! Session transport seam.
//!
//! The pipeline only needs to send client events and receive server events;
//! how they travel (websocket, local socket, test channel) is behind this
//! trait.

use crate::error::{Result, VoxlateError};
use crate::session::protocol::{ClientEvent, ServerEvent};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Bidirectional event transport to the translation server.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Sends one event to the server.
    async fn send(&self, event: ClientEvent) -> Result<()>;

    /// Receives the next server event. Returns `None` when the connection
    /// has closed.
    async fn recv(&mut self) -> Option<ServerEvent>;
}

/// Channel-backed transport for tests.
///
/// Sent client events land on `sent_rx`; server events pushed into
/// `incoming_tx` come back out of `recv`.
pub struct MockTransport {
    sent_tx: mpsc::UnboundedSender<ClientEvent>,
    incoming_rx: mpsc::UnboundedReceiver<ServerEvent>,
    fail_sends: bool,
}

/// Test-side handles for a [`MockTransport`].
pub struct MockTransportHandle {
    pub sent_rx: mpsc::UnboundedReceiver<ClientEvent>,
    pub incoming_tx: mpsc::UnboundedSender<ServerEvent>,
}

impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        (
            Self {
                sent_tx,
                incoming_rx,
                fail_sends: false,
            },
            MockTransportHandle {
                sent_rx,
                incoming_tx,
            },
        )
    }

    /// Makes every `send` fail, simulating a dead connection.
    pub fn with_failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn send(&self, event: ClientEvent) -> Result<()> {
        if self.fail_sends {
            return Err(VoxlateError::Transport {
                message: "connection closed".to_string(),
            });
        }
        self.sent_tx.send(event).map_err(|_| VoxlateError::Transport {
            message: "connection closed".to_string(),
        })
    }

    async fn recv(&mut self) -> Option<ServerEvent> {
        self.incoming_rx.recv().await
    }
}
