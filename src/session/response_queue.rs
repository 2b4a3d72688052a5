//! Single-flight response arbiter.
//!
//! The session supports exactly one active response at a time. A request
//! arriving while a response is still processing is rejected on the spot, no
//! network round trip; callers retry once the active response settles. If
//! the server still rejects a sent request with the active-response conflict
//! (e.g. a response created by server-side VAD), the request goes back to the
//! FRONT of the pending queue and is retried after a short backoff,
//! preserving segment order.
//!
//! The pending queue therefore only holds conflict-requeued requests and
//! requests accepted while a retry backoff is running. It is bounded;
//! callers of a full queue get an immediate rejection rather than unbounded
//! memory growth.

use crate::defaults;
use crate::error::{Result, VoxlateError};
use crate::session::protocol::{ClientEvent, ServerEvent, ACTIVE_RESPONSE_CONFLICT};
use base64::engine::{general_purpose::STANDARD as BASE64_STANDARD, Engine};
use std::collections::VecDeque;
use tokio::sync::{mpsc, oneshot};

/// A request to generate one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRequest {
    /// Segment this response belongs to.
    pub segment_id: u64,
    /// Requested outputs, e.g. `["text", "audio"]`.
    pub modalities: Vec<String>,
    /// Generation instructions, e.g. the translation directive.
    pub instructions: Option<String>,
}

/// Everything the server produced for one response.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedResponse {
    pub response_id: String,
    pub transcript: Option<String>,
    /// Decoded audio bytes, concatenated in delta order.
    pub audio: Vec<u8>,
}

/// What the driver should do after a server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Conflict: the request was requeued, retry after the backoff.
    RetryAfterBackoff,
    /// The in-flight request failed and its caller was notified.
    Failed,
    /// No request was in flight; nothing to do.
    Ignored,
}

struct QueuedResponse {
    request: ResponseRequest,
    completion: oneshot::Sender<Result<CompletedResponse>>,
}

struct InFlight {
    queued: QueuedResponse,
    response_id: Option<String>,
    transcript: String,
    audio: Vec<u8>,
}

/// Queue state machine. Pure and synchronous; the driver owns all timers
/// and I/O, which keeps this testable without a runtime.
pub struct ResponseQueue {
    pending: VecDeque<QueuedResponse>,
    in_flight: Option<InFlight>,
    capacity: usize,
}

impl ResponseQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: None,
            capacity: capacity.max(1),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Queues a request, returning the completion receiver.
    ///
    /// Fails immediately, without a network round trip, when a response is
    /// already processing or the pending queue is at capacity; the request
    /// is not partially accepted.
    pub fn enqueue(
        &mut self,
        request: ResponseRequest,
    ) -> Result<oneshot::Receiver<Result<CompletedResponse>>> {
        if let Err(rejection) = self.admit() {
            return Err(rejection);
        }
        let (completion, receiver) = oneshot::channel();
        self.pending.push_back(QueuedResponse {
            request,
            completion,
        });
        Ok(receiver)
    }

    /// Queues a request with a caller-provided completion channel. A
    /// rejected request resolves the completion with the rejection instead.
    fn enqueue_with(
        &mut self,
        request: ResponseRequest,
        completion: oneshot::Sender<Result<CompletedResponse>>,
    ) {
        if let Err(rejection) = self.admit() {
            let _ = completion.send(Err(rejection));
            return;
        }
        self.pending.push_back(QueuedResponse {
            request,
            completion,
        });
    }

    fn admit(&self) -> Result<()> {
        if self.in_flight.is_some() {
            return Err(VoxlateError::ResponseInProgress);
        }
        if self.pending.len() >= self.capacity {
            return Err(VoxlateError::QueueFull {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Takes the next request to send, marking it in flight.
    ///
    /// Returns `None` while a response is already active. The in-flight mark
    /// is set BEFORE the caller performs the send, so a server event racing
    /// the send still finds the request accounted for.
    pub fn try_begin(&mut self) -> Option<ResponseRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        let queued = self.pending.pop_front()?;
        let request = queued.request.clone();
        self.in_flight = Some(InFlight {
            queued,
            response_id: None,
            transcript: String::new(),
            audio: Vec::new(),
        });
        Some(request)
    }

    pub fn handle_response_created(&mut self, response_id: String) {
        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.response_id = Some(response_id);
        }
    }

    pub fn handle_transcript_delta(&mut self, delta: &str) {
        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.transcript.push_str(delta);
        }
    }

    /// Decodes and appends one audio delta. A chunk that fails to decode is
    /// dropped; the rest of the response is still usable.
    pub fn handle_audio_delta(&mut self, delta: &str) -> Result<()> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Ok(());
        };
        let bytes = BASE64_STANDARD
            .decode(delta)
            .map_err(|e| VoxlateError::Transport {
                message: format!("invalid audio delta: {}", e),
            })?;
        in_flight.audio.extend_from_slice(&bytes);
        Ok(())
    }

    /// Completes the in-flight request and frees the slot for the next one.
    pub fn handle_response_done(&mut self, response_id: &str) -> bool {
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };
        let transcript = if in_flight.transcript.is_empty() {
            None
        } else {
            Some(in_flight.transcript)
        };
        // The caller may have dropped the receiver; that's fine.
        let _ = in_flight.queued.completion.send(Ok(CompletedResponse {
            response_id: response_id.to_string(),
            transcript,
            audio: in_flight.audio,
        }));
        true
    }

    /// Handles a server error event.
    ///
    /// The active-response conflict requeues the request at the front so
    /// segment order is preserved; any other error fails the request.
    pub fn handle_error(&mut self, code: &str, message: &str) -> ErrorDisposition {
        let Some(in_flight) = self.in_flight.take() else {
            return ErrorDisposition::Ignored;
        };
        if code == ACTIVE_RESPONSE_CONFLICT {
            self.pending.push_front(in_flight.queued);
            return ErrorDisposition::RetryAfterBackoff;
        }
        let _ = in_flight.queued.completion.send(Err(VoxlateError::Session {
            code: code.to_string(),
            message: message.to_string(),
        }));
        ErrorDisposition::Failed
    }

    /// Drops everything, e.g. on disconnect. Every waiting caller is told
    /// the queue was cleared rather than left hanging.
    pub fn clear(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            let _ = in_flight.queued.completion.send(Err(VoxlateError::QueueCleared));
        }
        for queued in self.pending.drain(..) {
            let _ = queued.completion.send(Err(VoxlateError::QueueCleared));
        }
    }
}

impl Default for ResponseQueue {
    fn default() -> Self {
        Self::new(defaults::RESPONSE_QUEUE_CAPACITY)
    }
}

/// Commands accepted by the queue driver.
pub enum QueueCommand {
    Enqueue {
        request: ResponseRequest,
        completion: oneshot::Sender<Result<CompletedResponse>>,
    },
    Clear,
}

/// Drives the queue against the session event streams.
///
/// Pulls commands and server events, emits `create_response` client events,
/// and owns the conflict-retry backoff timer. Returns when both inputs
/// close.
pub async fn run_response_queue(
    mut queue: ResponseQueue,
    mut commands: mpsc::Receiver<QueueCommand>,
    mut events: mpsc::Receiver<ServerEvent>,
    outgoing: mpsc::Sender<ClientEvent>,
) {
    let mut backoff_until: Option<tokio::time::Instant> = None;

    loop {
        // Start the next send whenever the slot is free and no backoff is
        // pending.
        if backoff_until.is_none()
            && let Some(request) = queue.try_begin()
        {
            let event = ClientEvent::CreateResponse {
                modalities: request.modalities.clone(),
                instructions: request.instructions.clone(),
            };
            if outgoing.send(event).await.is_err() {
                queue.clear();
                return;
            }
        }

        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(QueueCommand::Enqueue { request, completion }) => {
                        queue.enqueue_with(request, completion);
                    }
                    Some(QueueCommand::Clear) => queue.clear(),
                    // Command side gone: nobody is listening for results.
                    None => {
                        queue.clear();
                        return;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Some(ServerEvent::ResponseCreated { response_id }) => {
                        queue.handle_response_created(response_id);
                    }
                    Some(ServerEvent::TranscriptDelta { delta, .. }) => {
                        queue.handle_transcript_delta(&delta);
                    }
                    Some(ServerEvent::AudioDelta { delta, .. }) => {
                        if let Err(e) = queue.handle_audio_delta(&delta) {
                            eprintln!("[response-queue] dropped audio delta: {}", e);
                        }
                    }
                    Some(ServerEvent::ResponseDone { response_id }) => {
                        queue.handle_response_done(&response_id);
                    }
                    Some(ServerEvent::Error { code, message }) => {
                        if queue.handle_error(&code, &message)
                            == ErrorDisposition::RetryAfterBackoff
                        {
                            backoff_until = Some(
                                tokio::time::Instant::now() + defaults::CONFLICT_RETRY_BACKOFF,
                            );
                        }
                    }
                    Some(_) => {}
                    // Connection closed: nothing queued can complete now.
                    None => {
                        queue.clear();
                        return;
                    }
                }
            }
            _ = async {
                if let Some(deadline) = backoff_until {
                    tokio::time::sleep_until(deadline).await;
                }
            }, if backoff_until.is_some() => {
                backoff_until = None;
            }
        }
    }
}
