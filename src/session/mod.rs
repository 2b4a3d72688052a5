//! Translation session: wire protocol, transport seam, the single-flight
//! response arbiter, and the session-backed segment processor.

pub mod processor;
pub mod protocol;
pub mod response_queue;
pub mod transport;

pub use processor::{SessionProcessor, TranslationDirectives};
pub use protocol::{ACTIVE_RESPONSE_CONFLICT, ClientEvent, ServerEvent};
pub use response_queue::{
    CompletedResponse, ErrorDisposition, QueueCommand, ResponseQueue, ResponseRequest,
    run_response_queue,
};
pub use transport::{MockTransport, MockTransportHandle, SessionTransport};

use crate::defaults;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A running session: transport pump plus response arbiter.
///
/// Owns the transport. When the connection closes (or the session is
/// dropped), the arbiter clears its queue and every pending request resolves
/// with [`crate::error::VoxlateError::QueueCleared`].
pub struct Session {
    commands: mpsc::Sender<QueueCommand>,
    outgoing: mpsc::Sender<ClientEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Starts the session over the given transport.
    pub fn start<T: SessionTransport + 'static>(transport: T) -> Self {
        Self::start_with_capacity(transport, defaults::RESPONSE_QUEUE_CAPACITY)
    }

    pub fn start_with_capacity<T: SessionTransport + 'static>(
        mut transport: T,
        capacity: usize,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(capacity.max(1) * 2);
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<ClientEvent>(64);
        let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(64);

        let arbiter = tokio::spawn(run_response_queue(
            ResponseQueue::new(capacity),
            command_rx,
            event_rx,
            outgoing_tx.clone(),
        ));

        // One task owns the transport and pumps both directions. Either side
        // closing ends the pump; dropping `event_tx` then tells the arbiter
        // to clear.
        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = outgoing_rx.recv() => {
                        match event {
                            Some(event) => {
                                if let Err(e) = transport.send(event).await {
                                    eprintln!("[session] send failed: {}", e);
                                    return;
                                }
                            }
                            None => return,
                        }
                    }
                    incoming = transport.recv() => {
                        match incoming {
                            Some(event) => {
                                if event_tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                            None => return,
                        }
                    }
                }
            }
        });

        Self {
            commands: command_tx,
            outgoing: outgoing_tx,
            tasks: vec![arbiter, pump],
        }
    }

    /// Command channel for enqueueing response requests.
    pub fn commands(&self) -> mpsc::Sender<QueueCommand> {
        self.commands.clone()
    }

    /// Outgoing client event channel (audio appends, commits).
    pub fn outgoing(&self) -> mpsc::Sender<ClientEvent> {
        self.outgoing.clone()
    }

    /// Builds a segment processor bound to this session.
    pub fn processor(&self, directives: TranslationDirectives) -> SessionProcessor {
        SessionProcessor::new(self.commands(), self.outgoing(), directives)
    }

    /// Clears all pending response requests, e.g. before teardown.
    pub async fn clear_responses(&self) {
        let _ = self.commands.send(QueueCommand::Clear).await;
    }

    /// Disconnects and waits for the session tasks to finish.
    pub async fn shutdown(mut self) {
        drop(self.commands);
        drop(self.outgoing);
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxlateError;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_session_round_trip() {
        let (transport, mut handle) = MockTransport::new();
        let session = Session::start(transport);

        let (completion, receiver) = oneshot::channel();
        session
            .commands()
            .send(QueueCommand::Enqueue {
                request: ResponseRequest {
                    segment_id: 0,
                    modalities: vec!["text".to_string()],
                    instructions: None,
                },
                completion,
            })
            .await
            .unwrap();

        // The arbiter sends the request over the transport.
        let sent = handle.sent_rx.recv().await.unwrap();
        assert!(matches!(sent, ClientEvent::CreateResponse { .. }));

        // Server responds through the transport.
        handle
            .incoming_tx
            .send(ServerEvent::ResponseCreated {
                response_id: "r1".to_string(),
            })
            .unwrap();
        handle
            .incoming_tx
            .send(ServerEvent::TranscriptDelta {
                response_id: "r1".to_string(),
                delta: "Hallo".to_string(),
            })
            .unwrap();
        handle
            .incoming_tx
            .send(ServerEvent::ResponseDone {
                response_id: "r1".to_string(),
            })
            .unwrap();

        let completed = receiver.await.unwrap().unwrap();
        assert_eq!(completed.transcript.as_deref(), Some("Hallo"));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_clears_pending() {
        let (transport, handle) = MockTransport::new();
        let session = Session::start(transport);

        let (completion, receiver) = oneshot::channel();
        session
            .commands()
            .send(QueueCommand::Enqueue {
                request: ResponseRequest {
                    segment_id: 0,
                    modalities: vec!["text".to_string()],
                    instructions: None,
                },
                completion,
            })
            .await
            .unwrap();

        // Dropping the server side closes the connection.
        drop(handle);

        let err = receiver.await.unwrap().unwrap_err();
        assert!(matches!(err, VoxlateError::QueueCleared));

        session.shutdown().await;
    }
}
