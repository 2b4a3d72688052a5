//! Session-backed segment processor.
//!
//! Bridges the processing queue to the translation session: segment audio is
//! appended and committed once, then the transcript and translated-audio
//! paths each request their own response through the single-flight arbiter.
//! Running the paths as separate responses keeps their failures isolated.

use crate::error::{Result, VoxlateError};
use crate::pipeline::segment_queue::SegmentProcessor;
use crate::pipeline::types::SpeechSegment;
use crate::session::protocol::ClientEvent;
use crate::session::response_queue::{QueueCommand, ResponseRequest};
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD as BASE64_STANDARD, Engine};
use tokio::sync::{mpsc, oneshot, Mutex};

/// Per-path generation directives.
#[derive(Debug, Clone)]
pub struct TranslationDirectives {
    /// Instructions for the transcript path, e.g.
    /// "Transcribe the audio verbatim in the source language."
    pub transcribe: Option<String>,
    /// Instructions for the audio path, e.g.
    /// "Translate the audio to German and speak the translation."
    pub translate: Option<String>,
}

impl TranslationDirectives {
    /// Builds directives for a source/target language pair.
    pub fn for_languages(source: &str, target: &str) -> Self {
        Self {
            transcribe: Some(format!("Transcribe the audio verbatim in {}.", source)),
            translate: Some(format!(
                "Translate the audio to {} and speak only the translation.",
                target
            )),
        }
    }
}

/// Processes segments through the remote session.
pub struct SessionProcessor {
    commands: mpsc::Sender<QueueCommand>,
    outgoing: mpsc::Sender<ClientEvent>,
    directives: TranslationDirectives,
    /// Highest segment id already committed. Both paths run concurrently
    /// for the same segment; only the first one sends the audio.
    committed: Mutex<Option<u64>>,
}

impl SessionProcessor {
    pub fn new(
        commands: mpsc::Sender<QueueCommand>,
        outgoing: mpsc::Sender<ClientEvent>,
        directives: TranslationDirectives,
    ) -> Self {
        Self {
            commands,
            outgoing,
            directives,
            committed: Mutex::new(None),
        }
    }

    /// Appends and commits the segment audio, once per segment id.
    async fn commit_audio(&self, segment: &SpeechSegment) -> Result<()> {
        let mut committed = self.committed.lock().await;
        if *committed == Some(segment.id) {
            return Ok(());
        }

        let audio = BASE64_STANDARD.encode(samples_to_bytes(&segment.samples));
        self.send(ClientEvent::AppendAudio { audio }).await?;
        self.send(ClientEvent::CommitSegment {
            segment_id: segment.id,
        })
        .await?;

        *committed = Some(segment.id);
        Ok(())
    }

    async fn send(&self, event: ClientEvent) -> Result<()> {
        self.outgoing
            .send(event)
            .await
            .map_err(|_| VoxlateError::Transport {
                message: "session closed".to_string(),
            })
    }

    /// Requests one response and waits for it to settle.
    ///
    /// The arbiter takes one request at a time; a busy rejection here just
    /// means the other path's response is still active, so wait and retry.
    async fn request_response(
        &self,
        segment_id: u64,
        modalities: Vec<String>,
        instructions: Option<String>,
    ) -> Result<crate::session::response_queue::CompletedResponse> {
        let request = ResponseRequest {
            segment_id,
            modalities,
            instructions,
        };
        loop {
            let (completion, receiver) = oneshot::channel();
            self.commands
                .send(QueueCommand::Enqueue {
                    request: request.clone(),
                    completion,
                })
                .await
                .map_err(|_| VoxlateError::Transport {
                    message: "session closed".to_string(),
                })?;

            match receiver.await.map_err(|_| VoxlateError::QueueCleared)? {
                Err(VoxlateError::ResponseInProgress) => {
                    tokio::time::sleep(crate::defaults::ENQUEUE_RETRY_DELAY).await;
                }
                outcome => return outcome,
            }
        }
    }
}

#[async_trait]
impl SegmentProcessor for SessionProcessor {
    async fn transcribe(&self, segment: &SpeechSegment) -> Result<String> {
        self.commit_audio(segment).await?;
        let completed = self
            .request_response(
                segment.id,
                vec!["text".to_string()],
                self.directives.transcribe.clone(),
            )
            .await?;
        completed.transcript.ok_or_else(|| VoxlateError::Session {
            code: "empty_response".to_string(),
            message: "response carried no transcript".to_string(),
        })
    }

    async fn synthesize(&self, segment: &SpeechSegment) -> Result<Vec<u8>> {
        self.commit_audio(segment).await?;
        let completed = self
            .request_response(
                segment.id,
                vec!["text".to_string(), "audio".to_string()],
                self.directives.translate.clone(),
            )
            .await?;
        if completed.audio.is_empty() {
            return Err(VoxlateError::Session {
                code: "empty_response".to_string(),
                message: "response carried no audio".to_string(),
            });
        }
        Ok(completed.audio)
    }
}

/// PCM16 little-endian byte view of the samples.
fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
