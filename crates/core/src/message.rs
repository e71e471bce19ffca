//! Chat Message Model
//!
//! Defines the entries of a conversation as the client sees them: who said
//! it, where it came from, and whether it is still being streamed.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "you"),
            Sender::Bot => write!(f, "bot"),
        }
    }
}

/// The channel a message arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Produced by the chat backend over the WebSocket.
    Socket,
    /// Transcribed from a voice call.
    Voice,
    /// Typed locally by the user.
    User,
}

/// A reference to a synthesized audio clip, usually a URL or a server path.
///
/// Two references are the same clip if and only if their strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(String);

impl AudioRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves a server-relative reference (e.g. `/audio/1.mp3`) against a base URL.
    /// Absolute references are returned unchanged.
    pub fn resolve(&self, base_url: &str) -> String {
        if self.0.contains("://") {
            return self.0.clone();
        }
        let base = base_url.trim_end_matches('/');
        if self.0.starts_with('/') {
            format!("{}{}", base, self.0)
        } else {
            format!("{}/{}", base, self.0)
        }
    }
}

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub audio: Option<AudioRef>,
    /// Set while the reply is still streaming in.
    pub loading: bool,
    pub avatar: Option<String>,
    pub source: Source,
    /// Error-flavored bot message (upstream failure or lost connection).
    pub is_error: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            audio: None,
            loading: false,
            avatar: None,
            source: Source::User,
            is_error: false,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            audio: None,
            loading: false,
            avatar: None,
            source: Source::Socket,
            is_error: false,
        }
    }

    /// An empty bot message waiting for the streamed reply.
    pub fn placeholder() -> Self {
        Self {
            loading: true,
            ..Self::bot("")
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::bot(text)
        }
    }

    pub fn voice(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            audio: None,
            loading: false,
            avatar: None,
            source: Source::Voice,
            is_error: false,
        }
    }

    /// True for the in-progress socket reply placeholder.
    pub fn is_pending_reply(&self) -> bool {
        self.loading && self.sender == Sender::Bot && self.source == Source::Socket
    }
}
