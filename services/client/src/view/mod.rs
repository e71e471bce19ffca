//! Conversation View
//!
//! A line-oriented terminal front end. It renders the conversation published
//! by the session controller, filters it by interaction mode, autoplays new
//! reply audio, and turns typed lines into controller commands, voice room
//! toggles, audio toggles and clipboard copies.
//!
//! - `input`: parsing of typed lines into [`UserInput`].
//! - `render`: formatting of messages and incremental printing.

pub mod input;
pub mod render;

pub use input::{HELP_TEXT, UserInput, parse_input};
pub use render::{Transcript, render_message};

use crate::{
    audio::{AudioDeck, Playback},
    backend::ChatBackend,
    clipboard::Clipboard,
    voice::VoiceCall,
    ws::{ControllerHandle, SendError},
};
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};
use voxchat_core::{ConnectionState, Conversation, InteractionMode, Message, Sender};

/// Whether the view keeps running after handling a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct ConversationView<W: Write> {
    handle: ControllerHandle,
    backend: Arc<dyn ChatBackend>,
    voice: VoiceCall,
    deck: AudioDeck,
    clipboard: Box<dyn Clipboard>,
    transcript: Transcript,
    out: W,
}

impl<W: Write> ConversationView<W> {
    pub fn new(
        handle: ControllerHandle,
        backend: Arc<dyn ChatBackend>,
        voice: VoiceCall,
        deck: AudioDeck,
        clipboard: Box<dyn Clipboard>,
        out: W,
    ) -> Self {
        let transcript = Transcript::new(voice.mode());
        Self {
            handle,
            backend,
            voice,
            deck,
            clipboard,
            transcript,
            out,
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.voice.mode()
    }

    /// Renders until the user quits, input ends, or the controller stops.
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut conversation = self.handle.conversation();
        let mut connection = self.handle.connection();
        conversation.mark_changed();

        loop {
            tokio::select! {
                biased;
                changed = conversation.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = conversation.borrow_and_update().clone();
                    self.refresh(&snapshot)?;
                }
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *connection.borrow_and_update();
                    self.show_connection(state)?;
                }
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read input")? else {
                        debug!("Input closed.");
                        break;
                    };
                    if self.handle_line(&line).await? == Flow::Quit {
                        break;
                    }
                }
            }
        }
        self.deck.stop();
        Ok(())
    }

    /// Prints what changed and autoplays new reply audio.
    pub fn refresh(&mut self, conversation: &Conversation) -> Result<()> {
        let mode = self.mode();
        for line in self.transcript.update(conversation, mode) {
            writeln!(self.out, "{}", line)?;
        }
        if let Err(e) = self.deck.autoplay(conversation, mode) {
            warn!(error = %format!("{:#}", e), "Autoplay failed.");
            self.notify(&format!("Could not play audio: {:#}", e))?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match parse_input(line) {
            UserInput::Say(text) => return self.say(text).await,
            UserInput::ToggleVoice => self.toggle_voice().await?,
            UserInput::ToggleAudio(number) => self.toggle_audio(number)?,
            UserInput::Copy(number) => self.copy(number)?,
            UserInput::History => {
                let snapshot = self.handle.conversation().borrow().clone();
                for line in self.transcript.redraw(&snapshot, self.mode()) {
                    writeln!(self.out, "{}", line)?;
                }
            }
            UserInput::Help => writeln!(self.out, "{}", HELP_TEXT)?,
            UserInput::Quit => return Ok(Flow::Quit),
            UserInput::Usage(usage) => self.notify(&format!("Usage: {}", usage))?,
            UserInput::Unknown(name) => {
                self.notify(&format!("Unknown command '/{}'. Type /help for commands.", name))?
            }
        }
        self.out.flush()?;
        Ok(Flow::Continue)
    }

    async fn say(&mut self, text: String) -> Result<Flow> {
        if self.mode() == InteractionMode::Voice {
            if !text.is_empty() {
                self.handle.push_voice_transcript(Sender::User, text).await;
            }
            return Ok(Flow::Continue);
        }
        match self.handle.send_message(text).await {
            // A closed socket is reported in the conversation itself.
            Ok(()) | Err(SendError::EmptyMessage) | Err(SendError::NotConnected) => {}
            Err(SendError::AwaitingReply) => {
                self.notify("Still waiting for the previous reply.")?;
            }
            Err(SendError::ControllerGone) => {
                self.notify("The session has ended.")?;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    async fn toggle_voice(&mut self) -> Result<()> {
        let session = self.handle.session_id();
        match self.voice.toggle(self.backend.as_ref(), session.as_ref()).await {
            Ok(InteractionMode::Voice) => {
                let room = self.voice.room_name().unwrap_or_default().to_string();
                self.notify(&format!("Voice mode on (room {}).", room))?
            }
            Ok(InteractionMode::Text) => self.notify("Voice mode off.")?,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Voice toggle failed.");
                self.notify(&format!("{:#}", e))?;
                return Ok(());
            }
        }
        let snapshot = self.handle.conversation().borrow().clone();
        self.refresh(&snapshot)
    }

    fn toggle_audio(&mut self, number: usize) -> Result<()> {
        let Some(message) = self.visible_message(number) else {
            return self.notify(&format!("There is no message {}.", number));
        };
        let Some(audio) = message.audio else {
            return self.notify(&format!("Message {} has no audio.", number));
        };
        match self.deck.toggle(&audio) {
            Ok(Playback::Started) => self.notify(&format!("Playing message {}.", number)),
            Ok(Playback::Stopped) => self.notify(&format!("Stopped message {}.", number)),
            Err(e) => self.notify(&format!("Could not play audio: {:#}", e)),
        }
    }

    fn copy(&mut self, number: usize) -> Result<()> {
        let Some(message) = self.visible_message(number) else {
            return self.notify(&format!("There is no message {}.", number));
        };
        match self.clipboard.copy(&message.text) {
            Ok(()) => self.notify(&format!("Copied message {}.", number)),
            Err(e) => self.notify(&format!("{:#}", e)),
        }
    }

    fn visible_message(&self, number: usize) -> Option<Message> {
        let conversation = self.handle.conversation();
        let conversation = conversation.borrow();
        conversation
            .visible(self.mode())
            .nth(number.checked_sub(1)?)
            .cloned()
    }

    fn show_connection(&mut self, state: ConnectionState) -> Result<()> {
        match state {
            ConnectionState::Open => self.notify("Connected.")?,
            ConnectionState::Reconnecting { attempt } => {
                self.notify(&format!("Connection lost. Reconnecting (attempt {})...", attempt))?
            }
            ConnectionState::Connecting | ConnectionState::Failed | ConnectionState::Closed => {}
        }
        self.out.flush()?;
        Ok(())
    }

    fn notify(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "  * {}", text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::Speaker, backend::MockChatBackend, clipboard::tests::MemoryClipboard,
        ws::ControllerCommand,
    };
    use std::sync::Mutex;
    use tokio::sync::{mpsc, watch};
    use voxchat_core::{Action, AudioRef, SessionId, protocol::ServerEvent};

    #[derive(Clone, Default)]
    struct RecordingSpeaker {
        played: Arc<Mutex<Vec<String>>>,
        playing: Arc<Mutex<bool>>,
    }

    impl Speaker for RecordingSpeaker {
        fn play(&mut self, url: &str) -> Result<()> {
            self.played.lock().unwrap().push(url.to_string());
            *self.playing.lock().unwrap() = true;
            Ok(())
        }

        fn stop(&mut self) {
            *self.playing.lock().unwrap() = false;
        }

        fn is_playing(&mut self) -> bool {
            *self.playing.lock().unwrap()
        }
    }

    struct Harness {
        view: ConversationView<Vec<u8>>,
        commands: mpsc::Receiver<ControllerCommand>,
        conversation: watch::Sender<Conversation>,
        _connection: watch::Sender<ConnectionState>,
        speaker: RecordingSpeaker,
        clipboard: MemoryClipboard,
    }

    impl Harness {
        fn new(backend: MockChatBackend) -> Self {
            let (handle, commands, conversation, connection) =
                ControllerHandle::detached(SessionId::new("abc"));
            let speaker = RecordingSpeaker::default();
            let clipboard = MemoryClipboard::default();
            let view = ConversationView::new(
                handle,
                Arc::new(backend),
                VoiceCall::new("ada"),
                AudioDeck::new(Box::new(speaker.clone()), "http://localhost:8000"),
                Box::new(clipboard.clone()),
                Vec::new(),
            );
            Self {
                view,
                commands,
                conversation,
                _connection: connection,
                speaker,
                clipboard,
            }
        }

        fn publish(&self, actions: Vec<Action>) -> Conversation {
            let mut conversation = self.conversation.borrow().clone();
            for action in actions {
                conversation.apply(action);
            }
            self.conversation.send_replace(conversation.clone());
            conversation
        }

        fn take_commands(&mut self) -> mpsc::Receiver<ControllerCommand> {
            std::mem::replace(&mut self.commands, mpsc::channel(1).1)
        }

        fn take_output(&mut self) -> String {
            String::from_utf8(std::mem::take(&mut self.view.out)).unwrap()
        }
    }

    fn answered(question: &str, answer: &str, audio: Option<&str>) -> Vec<Action> {
        vec![
            Action::UserSent(question.to_string()),
            Action::Server(ServerEvent::Done {
                answer: Some(answer.to_string()),
                audio_url: audio.map(AudioRef::new),
            }),
        ]
    }

    #[tokio::test]
    async fn test_refresh_prints_and_autoplays() {
        let mut harness = Harness::new(MockChatBackend::new());
        let conversation = harness.publish(answered("Hello", "Hi there", Some("/audio/1.mp3")));

        harness.view.refresh(&conversation).unwrap();

        let output = harness.take_output();
        assert!(output.contains("[  1] you: Hello"));
        assert!(output.contains("[  2] bot: Hi there  [audio: /play 2]"));
        assert_eq!(
            *harness.speaker.played.lock().unwrap(),
            vec!["http://localhost:8000/audio/1.mp3"]
        );

        // Nothing new: nothing printed, nothing replayed.
        harness.view.refresh(&conversation).unwrap();
        assert_eq!(harness.take_output(), "");
        assert_eq!(harness.speaker.played.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_say_sends_to_controller() {
        let mut harness = Harness::new(MockChatBackend::new());
        let mut commands = harness.take_commands();
        let controller = tokio::spawn(async move {
            match commands.recv().await {
                Some(ControllerCommand::Send { text, reply }) => {
                    reply.send(Ok(())).unwrap();
                    text
                }
                other => panic!("unexpected command {:?}", other),
            }
        });

        let flow = harness.view.handle_line("What is Rust?").await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(controller.await.unwrap(), "What is Rust?");
    }

    #[tokio::test]
    async fn test_awaiting_reply_is_reported() {
        let mut harness = Harness::new(MockChatBackend::new());
        let mut commands = harness.take_commands();
        tokio::spawn(async move {
            if let Some(ControllerCommand::Send { reply, .. }) = commands.recv().await {
                let _ = reply.send(Err(SendError::AwaitingReply));
            }
        });

        harness.view.handle_line("again").await.unwrap();
        assert!(harness.take_output().contains("Still waiting for the previous reply."));
    }

    #[tokio::test]
    async fn test_controller_gone_quits() {
        let mut harness = Harness::new(MockChatBackend::new());
        harness.commands.close();

        let flow = harness.view.handle_line("hello").await.unwrap();
        assert_eq!(flow, Flow::Quit);
        assert!(harness.take_output().contains("The session has ended."));
    }

    #[tokio::test]
    async fn test_voice_mode_routes_lines_as_transcripts() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_voice_token()
            .times(1)
            .returning(|_: &str, _: &str| Ok("token".to_string()));
        let mut harness = Harness::new(backend);

        harness.view.handle_line("/voice").await.unwrap();
        assert_eq!(harness.view.mode(), InteractionMode::Voice);
        assert!(harness.take_output().contains("Voice mode on (room voice-abc)."));

        harness.view.handle_line("spoken words").await.unwrap();
        match harness.commands.recv().await {
            Some(ControllerCommand::VoiceTranscript { sender, text }) => {
                assert_eq!(sender, Sender::User);
                assert_eq!(text, "spoken words");
            }
            other => panic!("unexpected command {:?}", other),
        }

        harness.view.handle_line("/voice").await.unwrap();
        assert_eq!(harness.view.mode(), InteractionMode::Text);
    }

    #[tokio::test]
    async fn test_voice_toggle_failure_keeps_text_mode() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_voice_token()
            .returning(|_: &str, _: &str| Err(anyhow::anyhow!("unavailable")));
        let mut harness = Harness::new(backend);

        harness.view.handle_line("/voice").await.unwrap();
        assert_eq!(harness.view.mode(), InteractionMode::Text);
        assert!(harness.take_output().contains("Could not join the voice room"));
    }

    #[tokio::test]
    async fn test_voice_mode_suppresses_autoplay() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_voice_token()
            .returning(|_: &str, _: &str| Ok("token".to_string()));
        let mut harness = Harness::new(backend);
        harness.view.handle_line("/voice").await.unwrap();

        let conversation = harness.publish(answered("Hello", "Hi", Some("/audio/1.mp3")));
        harness.view.refresh(&conversation).unwrap();

        assert!(harness.speaker.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_play_toggles_message_audio() {
        let mut harness = Harness::new(MockChatBackend::new());
        let mut actions = answered("one", "first", Some("/audio/1.mp3"));
        actions.extend(answered("two", "second", None));
        harness.publish(actions);

        harness.view.handle_line("/play 2").await.unwrap();
        assert!(harness.take_output().contains("Playing message 2."));
        harness.view.handle_line("/play 2").await.unwrap();
        assert!(harness.take_output().contains("Stopped message 2."));

        harness.view.handle_line("/play 4").await.unwrap();
        assert!(harness.take_output().contains("Message 4 has no audio."));
        harness.view.handle_line("/play 9").await.unwrap();
        assert!(harness.take_output().contains("There is no message 9."));
    }

    #[tokio::test]
    async fn test_copy_uses_visible_numbering() {
        let mut harness = Harness::new(MockChatBackend::new());
        let mut actions = vec![Action::VoiceTranscript {
            sender: Sender::Bot,
            text: "hidden in text mode".to_string(),
        }];
        actions.extend(answered("Hello", "Hi there", None));
        harness.publish(actions);

        harness.view.handle_line("/copy 2").await.unwrap();
        assert_eq!(*harness.clipboard.copied.lock().unwrap(), vec!["Hi there"]);
        assert!(harness.take_output().contains("Copied message 2."));
    }

    #[tokio::test]
    async fn test_commands_without_side_effects() {
        let mut harness = Harness::new(MockChatBackend::new());
        harness.publish(answered("Hello", "Hi", None));

        harness.view.handle_line("/history").await.unwrap();
        let output = harness.take_output();
        assert!(output.contains("[  1] you: Hello"));
        assert!(output.contains("[  2] bot: Hi"));

        harness.view.handle_line("/help").await.unwrap();
        assert!(harness.take_output().contains("/play <n>"));

        harness.view.handle_line("/dance").await.unwrap();
        assert!(harness.take_output().contains("Unknown command '/dance'"));

        harness.view.handle_line("/copy").await.unwrap();
        assert!(harness.take_output().contains("Usage: /copy <n>"));

        assert_eq!(harness.view.handle_line("/quit").await.unwrap(), Flow::Quit);
    }

    #[tokio::test]
    async fn test_run_renders_updates_until_input_ends() {
        let mut harness = Harness::new(MockChatBackend::new());
        harness.publish(answered("Hello", "Hi there", None));

        harness.view.run(&b"/quit\n"[..]).await.unwrap();

        // The initial state is rendered before the quit line is read.
        let output = harness.take_output();
        assert!(output.contains("[  2] bot: Hi there"), "output: {}", output);
    }
}
