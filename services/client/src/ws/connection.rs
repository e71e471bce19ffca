//! Opens the chat socket and writes request envelopes to it.

use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message},
};
use voxchat_core::protocol::ClientRequest;

pub type ChatSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Performs the WebSocket handshake with the chat endpoint.
pub async fn connect(url: &str) -> Result<ChatSocket> {
    let (socket, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .context("Timed out connecting to the chat socket")?
        .with_context(|| format!("Failed to connect to {}", url))?;
    Ok(socket)
}

/// A helper function to serialize and send a `ClientRequest` to the backend.
pub async fn send_request<S>(sink: &mut S, request: &ClientRequest) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let serialized = serde_json::to_string(request)?;
    sink.send(Message::Text(serialized.into()))
        .await
        .context("Failed to write to the chat socket")?;
    Ok(())
}
