//! Synthesized Speech Playback
//!
//! The [`AudioDeck`] keeps at most one clip playing, identified by its
//! [`AudioRef`], and remembers which clips autoplay has already handled.
//! Actual playback is delegated to a [`Speaker`].

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use voxchat_core::{AudioRef, Conversation, InteractionMode};

/// Something that can play one audio URL at a time.
pub trait Speaker: Send {
    /// Starts playing `url`. Any clip already playing is stopped first.
    fn play(&mut self, url: &str) -> Result<()>;
    fn stop(&mut self);
    /// False once the last started clip finished on its own or was stopped.
    fn is_playing(&mut self) -> bool;
}

/// Plays audio by spawning an external player with the URL as last argument.
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandSpeaker {
    /// `command` is the program followed by its leading arguments.
    pub fn new(command: Vec<String>) -> Option<Self> {
        let mut parts = command.into_iter();
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            child: None,
        })
    }
}

impl Speaker for CommandSpeaker {
    fn play(&mut self, url: &str) -> Result<()> {
        self.stop();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start audio player '{}'", self.program))?;
        debug!(program = %self.program, %url, "Audio player started.");
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "Audio player already exited.");
            }
        }
    }

    fn is_playing(&mut self) -> bool {
        let finished = match self.child.as_mut() {
            Some(child) => !matches!(child.try_wait(), Ok(None)),
            None => return false,
        };
        if finished {
            self.child = None;
        }
        !finished
    }
}

/// Used when no player is configured: playback requests are only logged.
#[derive(Debug, Default)]
pub struct SilentSpeaker {
    warned: bool,
}

impl Speaker for SilentSpeaker {
    fn play(&mut self, url: &str) -> Result<()> {
        if !self.warned {
            warn!("No audio player configured; set VOXCHAT_AUDIO_PLAYER to hear replies.");
            self.warned = true;
        }
        debug!(%url, "Skipping playback.");
        Ok(())
    }

    fn stop(&mut self) {}

    fn is_playing(&mut self) -> bool {
        false
    }
}

/// Result of a user toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Started,
    Stopped,
}

pub struct AudioDeck {
    speaker: Box<dyn Speaker>,
    base_url: String,
    current: Option<AudioRef>,
    handled: HashSet<AudioRef>,
}

impl AudioDeck {
    /// Relative audio references are resolved against `base_url`.
    pub fn new(speaker: Box<dyn Speaker>, base_url: impl Into<String>) -> Self {
        Self {
            speaker,
            base_url: base_url.into(),
            current: None,
            handled: HashSet::new(),
        }
    }

    /// The clip currently playing, if it has not finished yet.
    pub fn current(&mut self) -> Option<&AudioRef> {
        if self.current.is_some() && !self.speaker.is_playing() {
            self.current = None;
        }
        self.current.as_ref()
    }

    pub fn is_playing(&mut self, audio: &AudioRef) -> bool {
        self.current() == Some(audio)
    }

    /// Stops `audio` if it is the clip playing; otherwise stops whatever is
    /// playing and starts `audio`.
    pub fn toggle(&mut self, audio: &AudioRef) -> Result<Playback> {
        if self.is_playing(audio) {
            self.stop();
            return Ok(Playback::Stopped);
        }
        self.start(audio)?;
        Ok(Playback::Started)
    }

    /// Plays the newest socket reply audio unless it was handled before.
    ///
    /// In voice mode the clip is marked as handled without playing, so it is
    /// not picked up later when the user switches back to text.
    pub fn autoplay(
        &mut self,
        conversation: &Conversation,
        mode: InteractionMode,
    ) -> Result<Option<AudioRef>> {
        let Some(latest) = conversation.latest_socket_audio() else {
            return Ok(None);
        };
        if !self.handled.insert(latest.clone()) {
            return Ok(None);
        }
        if !mode.autoplays() {
            debug!(audio = %latest, "Voice mode active; not autoplaying.");
            return Ok(None);
        }
        self.start(latest)?;
        Ok(Some(latest.clone()))
    }

    pub fn stop(&mut self) {
        if let Some(audio) = self.current.take() {
            debug!(%audio, "Stopping playback.");
        }
        self.speaker.stop();
    }

    fn start(&mut self, audio: &AudioRef) -> Result<()> {
        self.speaker.stop();
        self.current = None;
        self.handled.insert(audio.clone());
        let url = audio.resolve(&self.base_url);
        self.speaker.play(&url)?;
        info!(%url, "Playing reply audio.");
        self.current = Some(audio.clone());
        Ok(())
    }
}

impl Drop for AudioDeck {
    fn drop(&mut self) {
        self.speaker.stop();
    }
}
