//! Manages the chat socket lifecycle for one session.
//!
//! The controller owns the connection and the conversation. It is the only
//! writer of conversation state: socket events and user commands are turned
//! into reducer actions here, and every change is published to the view
//! through a `watch` channel.
//!
//! Whenever there is no open socket (while the session is resolved, during a
//! handshake, between reconnect attempts, and after giving up) commands are
//! still answered, and sends are refused with a visible notice.

use super::connection::{self, ChatSocket};
use crate::{backend::ChatBackend, session_store::SessionStore};
use anyhow::Result;
use futures_util::{Sink, SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::{self, protocol::Message as WsMessage};
use tracing::{Span, debug, field, info, instrument, warn};
use voxchat_core::{
    Action, ConnectionState, Conversation, Sender, SessionId,
    conversation::{CONNECTION_FAILED_NOTICE, NOT_CONNECTED_NOTICE},
    protocol::{ClientRequest, HistoryEntry, ProtocolError, decode_server_event},
    reconnect::{Clock, ReconnectPolicy, Reconnector},
};

/// Why `send_message` did not transmit anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("not connected to the server")]
    NotConnected,
    #[error("still waiting for the previous reply")]
    AwaitingReply,
    #[error("the session controller has stopped")]
    ControllerGone,
}

#[derive(Debug)]
pub enum ControllerCommand {
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    VoiceTranscript {
        sender: Sender,
        text: String,
    },
    Shutdown,
}

/// The view's side of a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    session: watch::Receiver<Option<SessionId>>,
    commands: mpsc::Sender<ControllerCommand>,
    conversation: watch::Receiver<Conversation>,
    connection: watch::Receiver<ConnectionState>,
}

impl ControllerHandle {
    /// The session in use, once it has been resolved.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.borrow().clone()
    }

    /// Sends a question. On `NotConnected` an error message has already been
    /// added to the conversation.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), SendError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(ControllerCommand::Send {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| SendError::ControllerGone)?;
        response.await.map_err(|_| SendError::ControllerGone)?
    }

    pub async fn push_voice_transcript(&self, sender: Sender, text: impl Into<String>) {
        let command = ControllerCommand::VoiceTranscript {
            sender,
            text: text.into(),
        };
        if self.commands.send(command).await.is_err() {
            warn!("Dropping voice transcript: controller has stopped.");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(ControllerCommand::Shutdown).await;
    }

    pub fn conversation(&self) -> watch::Receiver<Conversation> {
        self.conversation.clone()
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// A handle with no controller behind it; the caller plays the
    /// controller's part through the returned channel ends.
    #[cfg(test)]
    pub(crate) fn detached(
        session_id: SessionId,
    ) -> (
        Self,
        mpsc::Receiver<ControllerCommand>,
        watch::Sender<Conversation>,
        watch::Sender<ConnectionState>,
    ) {
        let (commands, commands_rx) = mpsc::channel(32);
        let (_, session) = watch::channel(Some(session_id));
        let (conversation_tx, conversation) = watch::channel(Conversation::new());
        let (connection_tx, connection) = watch::channel(ConnectionState::Open);
        let handle = Self {
            session,
            commands,
            conversation,
            connection,
        };
        (handle, commands_rx, conversation_tx, connection_tx)
    }
}

/// How a phase of the run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Disconnected,
    Shutdown,
}

/// Outcome of one attempt to get an open socket.
enum Opened {
    Socket(ChatSocket),
    Unavailable,
    Shutdown,
}

/// Where a session comes from when none was given up front.
#[derive(Clone)]
struct SessionSource {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn ChatBackend>,
}

pub struct SessionController {
    session_id: Option<SessionId>,
    source: Option<SessionSource>,
    socket_url: String,
    conversation: Conversation,
    reconnector: Reconnector,
    clock: Arc<dyn Clock>,
    commands: mpsc::Receiver<ControllerCommand>,
    session_tx: watch::Sender<Option<SessionId>>,
    conversation_tx: watch::Sender<Conversation>,
    connection_tx: watch::Sender<ConnectionState>,
}

impl SessionController {
    /// A controller for an already known session, starting with an empty
    /// conversation.
    pub fn new(
        session_id: SessionId,
        socket_url: impl Into<String>,
        policy: ReconnectPolicy,
        clock: Arc<dyn Clock>,
    ) -> (Self, ControllerHandle) {
        Self::build(Some(session_id), None, socket_url.into(), policy, clock)
    }

    /// A controller that resolves its session and history through `store`
    /// and `backend` before the first connect. A failed bootstrap counts as
    /// a failed connect attempt and is retried under `policy`.
    pub fn bootstrapping(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn ChatBackend>,
        socket_url: impl Into<String>,
        policy: ReconnectPolicy,
        clock: Arc<dyn Clock>,
    ) -> (Self, ControllerHandle) {
        let source = SessionSource { store, backend };
        Self::build(None, Some(source), socket_url.into(), policy, clock)
    }

    fn build(
        session_id: Option<SessionId>,
        source: Option<SessionSource>,
        socket_url: String,
        policy: ReconnectPolicy,
        clock: Arc<dyn Clock>,
    ) -> (Self, ControllerHandle) {
        let (commands_tx, commands) = mpsc::channel(32);
        let (session_tx, session_rx) = watch::channel(session_id.clone());
        let (conversation_tx, conversation_rx) = watch::channel(Conversation::new());
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::Connecting);

        let controller = Self {
            session_id,
            source,
            socket_url,
            conversation: Conversation::new(),
            reconnector: policy.reconnector(),
            clock,
            commands,
            session_tx,
            conversation_tx,
            connection_tx,
        };
        let handle = ControllerHandle {
            session: session_rx,
            commands: commands_tx,
            conversation: conversation_rx,
            connection: connection_rx,
        };
        (controller, handle)
    }

    /// Runs until shutdown: resolves the session, connects, pumps events,
    /// and reconnects per policy.
    #[instrument(name = "session_controller", skip_all, fields(session_id = field::Empty))]
    pub async fn run(mut self) {
        if let Some(id) = &self.session_id {
            Span::current().record("session_id", field::display(id));
        }
        loop {
            match self.open().await {
                Opened::Socket(socket) => {
                    info!(url = %self.socket_url, "Chat socket connected.");
                    self.reconnector.reset();
                    self.set_connection(ConnectionState::Open);
                    if self.drive(socket).await == Exit::Shutdown {
                        break;
                    }
                    warn!("Chat socket closed.");
                    self.apply(Action::ConnectionLost);
                }
                Opened::Unavailable => {}
                Opened::Shutdown => break,
            }

            match self.reconnector.next_delay() {
                Some(delay) => {
                    let attempt = self.reconnector.attempts();
                    let delay_ms = delay.as_millis() as u64;
                    info!(attempt, delay_ms, "Scheduling reconnect.");
                    self.set_connection(ConnectionState::Reconnecting { attempt });
                    if self.wait_offline(delay).await == Exit::Shutdown {
                        break;
                    }
                    self.set_connection(ConnectionState::Connecting);
                }
                None => {
                    warn!(
                        max_attempts = self.reconnector.policy().max_attempts,
                        "Giving up on the chat socket."
                    );
                    self.set_connection(ConnectionState::Failed);
                    self.apply(Action::Notice(CONNECTION_FAILED_NOTICE.to_string()));
                    self.serve_offline().await;
                    break;
                }
            }
        }
        self.set_connection(ConnectionState::Closed);
        info!("Session controller stopped.");
    }

    /// Resolves the session if needed, then performs the handshake.
    async fn open(&mut self) -> Opened {
        if self.session_id.is_none() {
            let Some(source) = self.source.clone() else {
                return Opened::Unavailable;
            };
            let resolve =
                async move { bootstrap(source.store.as_ref(), source.backend.as_ref()).await };
            match self.answer_offline_until(resolve).await {
                Some(Ok((id, history))) => self.adopt_session(id, history),
                Some(Err(e)) => {
                    warn!(error = %format!("{:#}", e), "Could not start a chat session.");
                    return Opened::Unavailable;
                }
                None => return Opened::Shutdown,
            }
        }

        let url = self.socket_url.clone();
        let handshake = async move { connection::connect(&url).await };
        match self.answer_offline_until(handshake).await {
            Some(Ok(socket)) => Opened::Socket(socket),
            Some(Err(e)) => {
                warn!(error = %format!("{:#}", e), "Chat socket unavailable.");
                Opened::Unavailable
            }
            None => Opened::Shutdown,
        }
    }

    fn adopt_session(&mut self, id: SessionId, history: Vec<HistoryEntry>) {
        Span::current().record("session_id", field::display(&id));
        self.session_tx.send_replace(Some(id.clone()));
        self.session_id = Some(id);
        self.apply(Action::SeedHistory(history));
    }

    /// Pumps one live connection until it closes or shutdown is requested.
    async fn drive(&mut self, socket: ChatSocket) -> Exit {
        let (mut sink, mut stream) = socket.split();
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.handle_frame(&text),
                    Some(Ok(WsMessage::Close(_))) | None => return Exit::Disconnected,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Error reading from chat socket.");
                        return Exit::Disconnected;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(ControllerCommand::Send { text, reply }) => {
                        let result = self.send_online(&mut sink, text).await;
                        let _ = reply.send(result);
                    }
                    Some(ControllerCommand::VoiceTranscript { sender, text }) => {
                        self.apply(Action::VoiceTranscript { sender, text });
                    }
                    Some(ControllerCommand::Shutdown) | None => {
                        let _ = sink.close().await;
                        return Exit::Shutdown;
                    }
                },
            }
        }
    }

    /// Drives `task` to completion while answering commands as offline.
    /// Returns `None` if shutdown was requested first.
    async fn answer_offline_until<F: Future>(&mut self, task: F) -> Option<F::Output> {
        tokio::pin!(task);
        loop {
            tokio::select! {
                output = &mut task => return Some(output),
                command = self.commands.recv() => {
                    if self.handle_offline(command) == Exit::Shutdown {
                        return None;
                    }
                }
            }
        }
    }

    /// Waits out a reconnect delay while still answering commands.
    async fn wait_offline(&mut self, delay: std::time::Duration) -> Exit {
        let clock = self.clock.clone();
        match self
            .answer_offline_until(async move { clock.sleep(delay).await })
            .await
        {
            Some(()) => Exit::Disconnected,
            None => Exit::Shutdown,
        }
    }

    /// Answers commands after the reconnect budget is spent.
    async fn serve_offline(&mut self) {
        loop {
            let command = self.commands.recv().await;
            if self.handle_offline(command) == Exit::Shutdown {
                return;
            }
        }
    }

    fn handle_offline(&mut self, command: Option<ControllerCommand>) -> Exit {
        match command {
            Some(ControllerCommand::Send { text, reply }) => {
                let result = if text.trim().is_empty() {
                    Err(SendError::EmptyMessage)
                } else {
                    self.apply(Action::Notice(NOT_CONNECTED_NOTICE.to_string()));
                    Err(SendError::NotConnected)
                };
                let _ = reply.send(result);
                Exit::Disconnected
            }
            Some(ControllerCommand::VoiceTranscript { sender, text }) => {
                self.apply(Action::VoiceTranscript { sender, text });
                Exit::Disconnected
            }
            Some(ControllerCommand::Shutdown) | None => Exit::Shutdown,
        }
    }

    async fn send_online<S>(&mut self, sink: &mut S, text: String) -> Result<(), SendError>
    where
        S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
    {
        let question = text.trim();
        if question.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        if self.conversation.is_awaiting_reply() {
            return Err(SendError::AwaitingReply);
        }
        let Some(session_id) = self.session_id.clone() else {
            return Err(SendError::NotConnected);
        };

        self.apply(Action::UserSent(question.to_string()));
        let request = ClientRequest {
            session_id,
            question: question.to_string(),
        };
        if let Err(e) = connection::send_request(sink, &request).await {
            warn!(error = %format!("{:#}", e), "Failed to transmit question.");
            self.apply(Action::ConnectionLost);
            return Err(SendError::NotConnected);
        }
        debug!("Question transmitted.");
        Ok(())
    }

    fn handle_frame(&mut self, text: &str) {
        match decode_server_event(text) {
            Ok(event) => {
                debug!(kind = event.kind(), "Received server event.");
                self.apply(Action::Server(event));
            }
            Err(ProtocolError::UnknownType(kind)) => {
                warn!(%kind, "Dropping event with unknown type.");
            }
            Err(e) => warn!(error = %e, "Dropping malformed payload."),
        }
    }

    fn apply(&mut self, action: Action) {
        if self.conversation.apply(action).is_changed() {
            self.conversation_tx.send_replace(self.conversation.clone());
        }
    }

    fn set_connection(&self, state: ConnectionState) {
        self.connection_tx.send_replace(state);
    }
}

/// Resolves the session identity and prior history.
///
/// A failed history fetch is not fatal: the session starts empty.
pub async fn bootstrap(
    store: &dyn SessionStore,
    backend: &dyn ChatBackend,
) -> Result<(SessionId, Vec<HistoryEntry>)> {
    let session_id = crate::session_store::obtain_session(store, backend).await?;
    let history = match backend.history(&session_id).await {
        Ok(history) => {
            info!(entries = history.len(), "Loaded conversation history.");
            history
        }
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Could not load history; starting empty.");
            Vec::new()
        }
    };
    Ok((session_id, history))
}
