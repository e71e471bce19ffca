//! Voice mode toggle.
//!
//! Entering voice mode means joining the session's voice room, which needs a
//! credential from the backend. Media transport is handled by the call
//! platform; the client only tracks whether it holds a credential.

use crate::backend::ChatBackend;
use anyhow::{Context, Result, bail};
use tracing::info;
use voxchat_core::{InteractionMode, SessionId};

pub struct VoiceCall {
    participant_name: String,
    joined: Option<Joined>,
}

/// The room and credential held while in voice mode.
struct Joined {
    room_name: String,
    token: String,
}

impl VoiceCall {
    pub fn new(participant_name: impl Into<String>) -> Self {
        Self {
            participant_name: participant_name.into(),
            joined: None,
        }
    }

    /// The room currently joined, if any.
    pub fn room_name(&self) -> Option<&str> {
        self.joined.as_ref().map(|j| j.room_name.as_str())
    }

    pub fn token(&self) -> Option<&str> {
        self.joined.as_ref().map(|j| j.token.as_str())
    }

    pub fn mode(&self) -> InteractionMode {
        if self.joined.is_some() {
            InteractionMode::Voice
        } else {
            InteractionMode::Text
        }
    }

    /// Joins or leaves the voice room of `session` and returns the resulting
    /// mode.
    ///
    /// Joining fetches a fresh credential; if that fails, or there is no
    /// session yet, the mode is unchanged.
    pub async fn toggle(
        &mut self,
        backend: &dyn ChatBackend,
        session: Option<&SessionId>,
    ) -> Result<InteractionMode> {
        if let Some(left) = self.joined.take() {
            info!(room = %left.room_name, "Left voice room.");
            return Ok(self.mode());
        }
        let Some(session) = session else {
            bail!("Could not join the voice room: no chat session yet");
        };
        let room_name = session.voice_room();
        let token = backend
            .voice_token(&room_name, &self.participant_name)
            .await
            .context("Could not join the voice room")?;
        info!(room = %room_name, participant = %self.participant_name, "Joined voice room.");
        self.joined = Some(Joined { room_name, token });
        Ok(self.mode())
    }
}
