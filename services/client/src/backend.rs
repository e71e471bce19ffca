//! HTTP Client for the Chat Backend
//!
//! Covers the three request/response endpoints: session bootstrap, history
//! and the voice call credential. The streaming part of the protocol lives
//! in [`crate::ws`].

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::debug;
use voxchat_core::{
    SessionId,
    protocol::{
        HistoryEntry, HistoryResponse, StartSessionResponse, VoiceTokenRequest,
        VoiceTokenResponse,
    },
};

/// The backend operations the client depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Asks the backend for a fresh session identifier.
    async fn start_session(&self) -> Result<SessionId>;

    /// Fetches prior question/answer exchanges of a session.
    async fn history(&self, session_id: &SessionId) -> Result<Vec<HistoryEntry>>;

    /// Obtains a credential for joining a voice room.
    async fn voice_token(&self, room_name: &str, participant_name: &str) -> Result<String>;
}

/// An implementation of `ChatBackend` over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/history/<id>` under the base URL, with the id percent-encoded as a
    /// single path segment.
    fn history_url(&self, session_id: &SessionId) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid backend URL '{}'", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Backend URL '{}' cannot take a path", self.base_url))?
            .pop_if_empty()
            .push("history")
            .push(session_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn start_session(&self) -> Result<SessionId> {
        let response: StartSessionResponse = self
            .client
            .get(self.url("/start-session"))
            .send()
            .await
            .context("Failed to reach the chat backend")?
            .error_for_status()
            .context("Backend refused to start a session")?
            .json()
            .await
            .context("Invalid start-session response")?;
        debug!(session_id = %response.session_id, "Backend issued a new session.");
        Ok(response.session_id)
    }

    async fn history(&self, session_id: &SessionId) -> Result<Vec<HistoryEntry>> {
        let response: HistoryResponse = self
            .client
            .get(self.history_url(session_id)?)
            .send()
            .await
            .context("Failed to reach the chat backend")?
            .error_for_status()
            .context("Backend refused to return the history")?
            .json()
            .await
            .context("Invalid history response")?;
        Ok(response.history)
    }

    async fn voice_token(&self, room_name: &str, participant_name: &str) -> Result<String> {
        let body = VoiceTokenRequest {
            room_name: room_name.to_string(),
            participant_name: participant_name.to_string(),
        };
        let response: VoiceTokenResponse = self
            .client
            .post(self.url("/livekit/token"))
            .json(&body)
            .send()
            .await
            .context("Failed to reach the chat backend")?
            .error_for_status()
            .context("Backend refused to issue a voice token")?
            .json()
            .await
            .context("Invalid voice token response")?;
        Ok(response.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::{Value, json};

    /// Serves `router` on an ephemeral port and returns its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_start_session() {
        let router = Router::new().route(
            "/start-session",
            get(|| async { Json(json!({ "session_id": "sess-42" })) }),
        );
        let backend = HttpBackend::new(serve(router).await);

        let id = backend.start_session().await.unwrap();
        assert_eq!(id, SessionId::new("sess-42"));
    }

    #[tokio::test]
    async fn test_history() {
        let router = Router::new().route(
            "/history/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!({
                    "history": [
                        { "question": format!("asked in {}", id), "answer": "answered" }
                    ]
                }))
            }),
        );
        let backend = HttpBackend::new(format!("{}/", serve(router).await));

        let history = backend.history(&SessionId::new("abc")).await.unwrap();
        assert_eq!(
            history,
            vec![HistoryEntry {
                question: "asked in abc".to_string(),
                answer: "answered".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_history_keeps_session_id_in_one_segment() {
        let router = Router::new().route(
            "/api/history/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!({ "history": [{ "question": id, "answer": "" }] }))
            }),
        );
        let backend = HttpBackend::new(format!("{}/api", serve(router).await));

        let history = backend.history(&SessionId::new("a b/c?d")).await.unwrap();
        assert_eq!(history[0].question, "a b/c?d");
    }

    #[tokio::test]
    async fn test_voice_token_posts_room_and_participant() {
        let router = Router::new().route(
            "/livekit/token",
            post(|Json(body): Json<Value>| async move {
                let token = format!(
                    "{}:{}",
                    body["room_name"].as_str().unwrap_or_default(),
                    body["participant_name"].as_str().unwrap_or_default()
                );
                Json(json!({ "token": token }))
            }),
        );
        let backend = HttpBackend::new(serve(router).await);

        let token = backend.voice_token("voice-abc", "ada").await.unwrap();
        assert_eq!(token, "voice-abc:ada");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let router = Router::new().route(
            "/start-session",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let backend = HttpBackend::new(serve(router).await);

        let err = backend.start_session().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Backend refused to start a session"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_reported() {
        let router = Router::new().route(
            "/history/{id}",
            get(|| async { Json(json!({ "history": "not a list" })) }),
        );
        let backend = HttpBackend::new(serve(router).await);

        let err = backend.history(&SessionId::new("x")).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid history response"));
    }
}
