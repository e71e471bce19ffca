//! Terminal rendering of the conversation.
//!
//! A terminal cannot redraw earlier lines, so [`Transcript`] prints only what
//! changed since the last render: new messages, messages that were updated
//! after being printed (e.g. audio attached later), and a single "thinking"
//! line while a reply streams in. This keeps the newest message at the bottom,
//! which is the terminal's form of autoscroll.

use voxchat_core::{Conversation, InteractionMode, Message, Sender, Source};

pub const THINKING_LINE: &str = "      bot is thinking...";

/// Formats one visible message with its 1-based number.
pub fn render_message(number: usize, message: &Message) -> String {
    let label = match (&message.avatar, message.sender) {
        (Some(avatar), sender) => format!("{} {}", avatar, sender),
        (None, sender) => sender.to_string(),
    };
    let mut line = format!("[{:>3}] {}", number, label);
    if message.source == Source::Voice {
        line.push_str(" (voice)");
    }
    if message.is_error {
        line.push_str(" (error)");
    }
    line.push_str(": ");

    if message.loading && message.text.is_empty() {
        line.push_str("...");
    } else {
        line.push_str(&message.text);
    }
    if message.audio.is_some() {
        line.push_str(&format!("  [audio: /play {}]", number));
    }
    line
}

#[derive(Debug, Default)]
pub struct Transcript {
    mode: InteractionMode,
    /// What was last printed at each visible position; `None` if nothing yet.
    printed: Vec<Option<Message>>,
    thinking_at: Option<usize>,
}

impl Transcript {
    pub fn new(mode: InteractionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Lines to print to bring the screen up to date with `conversation`.
    ///
    /// A mode change renumbers the visible messages, so it triggers a full
    /// redraw.
    pub fn update(&mut self, conversation: &Conversation, mode: InteractionMode) -> Vec<String> {
        if mode != self.mode {
            return self.redraw(conversation, mode);
        }

        let visible: Vec<&Message> = conversation.visible(mode).collect();
        if visible.len() < self.printed.len() {
            return self.redraw(conversation, mode);
        }
        self.printed.resize(visible.len(), None);

        let mut lines = Vec::new();
        for (idx, message) in visible.into_iter().enumerate() {
            if message.loading {
                if self.thinking_at != Some(idx) && message.sender == Sender::Bot {
                    lines.push(THINKING_LINE.to_string());
                    self.thinking_at = Some(idx);
                }
                continue;
            }
            if self.printed[idx].as_ref() != Some(message) {
                lines.push(render_message(idx + 1, message));
                self.printed[idx] = Some(message.clone());
            }
        }
        lines
    }

    /// Forgets what was printed and renders every visible message.
    pub fn redraw(&mut self, conversation: &Conversation, mode: InteractionMode) -> Vec<String> {
        *self = Self::new(mode);
        self.update(conversation, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxchat_core::{Action, AudioRef, protocol::ServerEvent};

    fn server(event: ServerEvent) -> Action {
        Action::Server(event)
    }

    #[test]
    fn test_render_message_markers() {
        assert_eq!(render_message(1, &Message::user("Hello")), "[  1] you: Hello");
        assert_eq!(
            render_message(2, &Message::error("Sorry")),
            "[  2] bot (error): Sorry"
        );
        assert_eq!(
            render_message(3, &Message::voice(Sender::Bot, "spoken")),
            "[  3] bot (voice): spoken"
        );
        assert_eq!(render_message(4, &Message::placeholder()), "[  4] bot: ...");

        let mut with_audio = Message::bot("Hi");
        with_audio.avatar = Some("*".to_string());
        with_audio.audio = Some(AudioRef::new("/audio/1.mp3"));
        assert_eq!(
            render_message(5, &with_audio),
            "[  5] * bot: Hi  [audio: /play 5]"
        );
    }

    #[test]
    fn test_streaming_reply_prints_thinking_once_then_final() {
        let mut conversation = Conversation::new();
        let mut transcript = Transcript::new(InteractionMode::Text);

        conversation.apply(Action::UserSent("Hello".to_string()));
        assert_eq!(
            transcript.update(&conversation, InteractionMode::Text),
            vec!["[  1] you: Hello".to_string(), THINKING_LINE.to_string()]
        );

        conversation.apply(server(ServerEvent::PartialText {
            text: "Hi".to_string(),
        }));
        assert!(transcript.update(&conversation, InteractionMode::Text).is_empty());

        conversation.apply(server(ServerEvent::Done {
            answer: Some("Hi there".to_string()),
            audio_url: None,
        }));
        assert_eq!(
            transcript.update(&conversation, InteractionMode::Text),
            vec!["[  2] bot: Hi there".to_string()]
        );
        assert!(transcript.update(&conversation, InteractionMode::Text).is_empty());
    }

    #[test]
    fn test_late_audio_reprints_message() {
        let mut conversation = Conversation::new();
        conversation.apply(server(ServerEvent::Done {
            answer: Some("Hi".to_string()),
            audio_url: None,
        }));
        let mut transcript = Transcript::new(InteractionMode::Text);
        transcript.update(&conversation, InteractionMode::Text);

        conversation.apply(server(ServerEvent::AudioReady {
            audio_url: AudioRef::new("/audio/1.mp3"),
        }));
        assert_eq!(
            transcript.update(&conversation, InteractionMode::Text),
            vec!["[  1] bot: Hi  [audio: /play 1]".to_string()]
        );
    }

    #[test]
    fn test_mode_change_redraws_with_voice_messages() {
        let mut conversation = Conversation::new();
        conversation.apply(Action::UserSent("typed".to_string()));
        conversation.apply(server(ServerEvent::Done {
            answer: Some("answered".to_string()),
            audio_url: None,
        }));
        conversation.apply(Action::VoiceTranscript {
            sender: Sender::User,
            text: "spoken".to_string(),
        });

        let mut transcript = Transcript::new(InteractionMode::Text);
        assert_eq!(transcript.update(&conversation, InteractionMode::Text).len(), 2);

        let lines = transcript.update(&conversation, InteractionMode::Voice);
        assert_eq!(
            lines,
            vec![
                "[  1] you: typed".to_string(),
                "[  2] bot: answered".to_string(),
                "[  3] you (voice): spoken".to_string(),
            ]
        );

        // Back in text mode the transcript line is hidden again.
        assert_eq!(transcript.update(&conversation, InteractionMode::Text).len(), 2);
    }
}
