//! Chat Socket Session
//!
//! - `connection`: opens the socket and writes request envelopes.
//! - `controller`: owns the connection, the reconnect policy and the
//!   conversation state, and serves commands from the view.

pub mod connection;
pub mod controller;

pub use controller::{ControllerCommand, ControllerHandle, SendError, SessionController, bootstrap};
