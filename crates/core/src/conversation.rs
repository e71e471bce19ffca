//! Conversation State Reducer
//!
//! All changes to the message sequence go through [`Conversation::apply`],
//! a pure function of the current messages and one [`Action`]. The session
//! controller feeds it socket events and user input; the view only reads.
//!
//! The sequence is append-only, except that the pending reply placeholder is
//! updated in place until a terminal event arrives. At most one placeholder
//! exists at any time.

use crate::{
    message::{AudioRef, Message, Sender, Source},
    mode::InteractionMode,
    protocol::{HistoryEntry, ServerEvent},
};
use tracing::{debug, warn};

pub const NOT_CONNECTED_NOTICE: &str =
    "Not connected to the server. Please wait while we try to reconnect.";
pub const CONNECTION_FAILED_NOTICE: &str =
    "Unable to reconnect to the server. Please restart voxchat to continue.";
pub const CONNECTION_LOST_REPLY: &str = "The connection was lost before the reply arrived.";
const UPSTREAM_ERROR_PREFIX: &str = "Sorry, something went wrong";

/// Everything that can change the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Prior exchanges fetched at startup.
    SeedHistory(Vec<HistoryEntry>),
    /// The user sent a question; adds the question and a reply placeholder.
    UserSent(String),
    /// An event decoded from the socket.
    Server(ServerEvent),
    /// A line transcribed from the voice call.
    VoiceTranscript { sender: Sender, text: String },
    /// A client-side error shown as a bot message.
    Notice(String),
    /// The socket dropped; a pending reply will never complete.
    ConnectionLost,
}

/// Outcome of applying an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Appended,
    Updated,
}

impl Change {
    pub fn is_changed(self) -> bool {
        self != Change::Unchanged
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True while a reply placeholder is waiting for its terminal event.
    pub fn is_awaiting_reply(&self) -> bool {
        self.pending_reply_index().is_some()
    }

    /// Messages shown in `mode`, in order.
    pub fn visible(&self, mode: InteractionMode) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |m| mode.shows(m))
    }

    /// The newest socket reply that carries audio, if any.
    pub fn latest_socket_audio(&self) -> Option<&AudioRef> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.source == Source::Socket && m.audio.is_some())
            .and_then(|m| m.audio.as_ref())
    }

    pub fn apply(&mut self, action: Action) -> Change {
        match action {
            Action::SeedHistory(entries) => self.seed_history(entries),
            Action::UserSent(text) => self.user_sent(text),
            Action::Server(event) => self.server_event(event),
            Action::VoiceTranscript { sender, text } => {
                self.messages.push(Message::voice(sender, text));
                Change::Appended
            }
            Action::Notice(text) => {
                self.messages.push(Message::error(text));
                Change::Appended
            }
            Action::ConnectionLost => match self.pending_reply_index() {
                Some(idx) => {
                    self.messages[idx] = Message::error(CONNECTION_LOST_REPLY);
                    Change::Updated
                }
                None => Change::Unchanged,
            },
        }
    }

    fn pending_reply_index(&self) -> Option<usize> {
        self.messages.iter().rposition(Message::is_pending_reply)
    }

    fn seed_history(&mut self, entries: Vec<HistoryEntry>) -> Change {
        if entries.is_empty() {
            return Change::Unchanged;
        }
        for entry in entries {
            self.messages.push(Message::user(entry.question));
            if !entry.answer.is_empty() {
                self.messages.push(Message::bot(entry.answer));
            }
        }
        Change::Appended
    }

    fn user_sent(&mut self, text: String) -> Change {
        if self.is_awaiting_reply() {
            warn!("Refusing to queue a question while a reply is pending.");
            return Change::Unchanged;
        }
        self.messages.push(Message::user(text));
        self.messages.push(Message::placeholder());
        Change::Appended
    }

    fn server_event(&mut self, event: ServerEvent) -> Change {
        match event {
            ServerEvent::Processing => {
                debug!("Backend is processing the question.");
                Change::Unchanged
            }
            ServerEvent::PartialText { text } => match self.pending_reply_index() {
                Some(idx) => {
                    self.messages[idx].text.push_str(&text);
                    Change::Updated
                }
                None => {
                    let mut placeholder = Message::placeholder();
                    placeholder.text = text;
                    self.messages.push(placeholder);
                    Change::Appended
                }
            },
            ServerEvent::Done { answer, audio_url } => {
                let answer = answer.filter(|a| !a.is_empty());
                match self.pending_reply_index() {
                    Some(idx) => {
                        let message = &mut self.messages[idx];
                        if let Some(answer) = answer {
                            message.text = answer;
                        }
                        message.audio = audio_url;
                        message.loading = false;
                        Change::Updated
                    }
                    None => match answer {
                        Some(answer) => {
                            let mut message = Message::bot(answer);
                            message.audio = audio_url;
                            self.messages.push(message);
                            Change::Appended
                        }
                        None => {
                            warn!("Received `done` with no pending reply and no answer.");
                            Change::Unchanged
                        }
                    },
                }
            }
            ServerEvent::AudioReady { audio_url } => {
                let target = self.messages.iter().rposition(|m| {
                    m.sender == Sender::Bot
                        && m.source == Source::Socket
                        && !m.loading
                        && !m.is_error
                        && m.audio.is_none()
                });
                match target {
                    Some(idx) => {
                        self.messages[idx].audio = Some(audio_url);
                        Change::Updated
                    }
                    None => {
                        debug!(%audio_url, "No reply waiting for audio; ignoring `audio_ready`.");
                        Change::Unchanged
                    }
                }
            }
            ServerEvent::AudioError { message } => match self.pending_reply_index() {
                Some(idx) => {
                    self.messages[idx] = Message::error(upstream_error_text(message.as_deref()));
                    Change::Updated
                }
                None => {
                    warn!(?message, "Speech synthesis failed for a delivered reply.");
                    Change::Unchanged
                }
            },
            ServerEvent::Error { message } => {
                let error = Message::error(upstream_error_text(message.as_deref()));
                match self.pending_reply_index() {
                    Some(idx) => {
                        self.messages[idx] = error;
                        Change::Updated
                    }
                    None => {
                        self.messages.push(error);
                        Change::Appended
                    }
                }
            }
        }
    }
}

fn upstream_error_text(detail: Option<&str>) -> String {
    match detail.map(str::trim).filter(|d| !d.is_empty()) {
        Some(detail) => format!("{}: {}", UPSTREAM_ERROR_PREFIX, detail),
        None => format!("{}. Please try again.", UPSTREAM_ERROR_PREFIX),
    }
}
