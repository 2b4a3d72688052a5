//! Wire protocol for the translation session.
//!
//! Events are JSON objects tagged by a `type` field, matching the realtime
//! API the session speaks. Client events flow up (audio, commits, response
//! requests); server events flow down (transcripts, synthesized audio,
//! completions, errors).

use crate::error::{Result, VoxlateError};
use serde::{Deserialize, Serialize};

/// Server error code meaning a response is already being generated.
///
/// The session supports only one active response at a time; requesting a
/// second one is rejected with this code and must be retried later.
pub const ACTIVE_RESPONSE_CONFLICT: &str = "conversation_already_has_active_response";

/// Events sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Appends base64-encoded audio to the current input buffer.
    AppendAudio { audio: String },
    /// Commits the buffered audio as one finished segment.
    CommitSegment { segment_id: u64 },
    /// Requests generation of a response for the committed audio.
    CreateResponse {
        /// Which outputs to produce, e.g. `["text"]` or `["text", "audio"]`.
        modalities: Vec<String>,
        /// Generation instructions, e.g. the translation directive.
        #[serde(skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
    },
}

/// Events received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The committed segment was accepted.
    SegmentCommitted { segment_id: u64 },
    /// Response generation started.
    ResponseCreated { response_id: String },
    /// Incremental transcript text.
    TranscriptDelta { response_id: String, delta: String },
    /// The transcript finished.
    TranscriptDone { response_id: String, text: String },
    /// A chunk of synthesized audio, base64-encoded.
    AudioDelta { response_id: String, delta: String },
    /// The audio stream finished.
    AudioDone { response_id: String },
    /// The whole response finished.
    ResponseDone { response_id: String },
    /// The server rejected something or hit an internal problem.
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Whether this is the single-active-response conflict rejection.
    pub fn is_active_response_conflict(&self) -> bool {
        matches!(self, ServerEvent::Error { code, .. } if code == ACTIVE_RESPONSE_CONFLICT)
    }
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| VoxlateError::Transport {
            message: format!("failed to encode event: {}", e),
        })
    }
}

impl ServerEvent {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VoxlateError::Transport {
            message: format!("failed to decode event: {}", e),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| VoxlateError::Transport {
            message: format!("failed to encode event: {}", e),
        })
    }
}
