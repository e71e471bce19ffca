use crate::message::{Message, Source};
use std::fmt;

/// Whether the user is typing or talking through a voice call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Text,
    Voice,
}

impl InteractionMode {
    pub fn toggled(self) -> Self {
        match self {
            InteractionMode::Text => InteractionMode::Voice,
            InteractionMode::Voice => InteractionMode::Text,
        }
    }

    /// Voice transcripts are only shown while the call is active.
    pub fn shows(self, message: &Message) -> bool {
        message.source != Source::Voice || self == InteractionMode::Voice
    }

    /// Synthesized replies are not auto-played over a live call.
    pub fn autoplays(self) -> bool {
        self == InteractionMode::Text
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionMode::Text => write!(f, "text"),
            InteractionMode::Voice => write!(f, "voice"),
        }
    }
}
