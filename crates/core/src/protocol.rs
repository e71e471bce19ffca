//! Defines the wire formats between the client and the chat backend.
//!
//! The WebSocket carries JSON envelopes discriminated by a `type` field; the
//! HTTP endpoints exchange plain JSON bodies.

use crate::{message::AudioRef, session::SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A question sent from the client to the backend over the socket.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientRequest {
    pub session_id: SessionId,
    pub question: String,
}

/// Events pushed from the backend to the client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The backend accepted the question and is working on it.
    Processing,
    /// A streamed fragment of the answer.
    PartialText { text: String },
    /// The answer is complete.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_url: Option<AudioRef>,
    },
    /// Speech for an already delivered answer has been synthesized.
    AudioReady { audio_url: AudioRef },
    /// Speech synthesis failed.
    AudioError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The backend failed to answer.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ServerEvent {
    pub const KNOWN_TYPES: [&'static str; 6] = [
        "processing",
        "partial_text",
        "done",
        "audio_ready",
        "audio_error",
        "error",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Processing => "processing",
            ServerEvent::PartialText { .. } => "partial_text",
            ServerEvent::Done { .. } => "done",
            ServerEvent::AudioReady { .. } => "audio_ready",
            ServerEvent::AudioError { .. } => "audio_error",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("payload has no string `type` field")]
    MissingType,
    #[error("unknown event type: {0}")]
    UnknownType(String),
}

/// Decodes a text frame from the backend.
///
/// Unknown discriminants are reported separately from malformed payloads so
/// the caller can log them at a different level.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !ServerEvent::KNOWN_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Response of `GET /start-session`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
}

/// One question/answer exchange from a previous visit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
}

/// Response of `GET /history/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Body of `POST /livekit/token`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoiceTokenRequest {
    pub room_name: String,
    pub participant_name: String,
}

/// Response of `POST /livekit/token`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoiceTokenResponse {
    pub token: String,
}
