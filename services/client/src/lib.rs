//! Voxchat Client Library Crate
//!
//! This library contains the I/O side of the chat client: configuration, the
//! HTTP backend client, session persistence, the WebSocket session
//! controller, and the terminal conversation view with its audio, clipboard
//! and voice helpers. The `voxchat` binary is a thin wrapper around it.

pub mod audio;
pub mod backend;
pub mod clipboard;
pub mod config;
pub mod session_store;
pub mod view;
pub mod voice;
pub mod ws;
