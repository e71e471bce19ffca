//! Voxchat Core
//!
//! The I/O-free part of the chat client: the message model, the wire protocol,
//! the conversation reducer and the reconnection policy.

pub mod conversation;
pub mod message;
pub mod mode;
pub mod protocol;
pub mod reconnect;
pub mod session;

pub use conversation::{Action, Change, Conversation};
pub use message::{AudioRef, Message, Sender, Source};
pub use mode::InteractionMode;
pub use session::SessionId;

/// Connection status published by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    /// Waiting before reconnect attempt `attempt`.
    Reconnecting { attempt: u32 },
    /// The reconnect ceiling was reached; no more attempts will be made.
    Failed,
    /// The controller shut down.
    Closed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}
