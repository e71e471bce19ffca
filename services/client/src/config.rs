use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use voxchat_core::reconnect::{DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS, ReconnectPolicy};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP base of the chat backend, without trailing slash.
    pub api_base_url: String,
    /// WebSocket base of the chat backend, without trailing slash.
    pub ws_base_url: String,
    pub session_file: PathBuf,
    pub participant_name: String,
    pub reconnect: ReconnectPolicy,
    /// Program and leading arguments used to play an audio URL.
    pub audio_player: Option<Vec<String>>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_base_url = std::env::var("VOXCHAT_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let api_base_url = validate_api_url(&api_base_url)?;

        let ws_base_url = match std::env::var("VOXCHAT_WS_URL") {
            Ok(url) => validate_ws_url(&url)?,
            Err(_) => derive_ws_url(&api_base_url),
        };

        let session_file = std::env::var("VOXCHAT_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_file());

        let participant_name =
            std::env::var("VOXCHAT_PARTICIPANT").unwrap_or_else(|_| "guest".to_string());
        if participant_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "VOXCHAT_PARTICIPANT".to_string(),
                "participant name must not be empty".to_string(),
            ));
        }

        let max_attempts = parse_var("VOXCHAT_MAX_RECONNECTS", DEFAULT_MAX_ATTEMPTS)?;
        let delay_ms = parse_var(
            "VOXCHAT_RECONNECT_DELAY_MS",
            DEFAULT_DELAY.as_millis() as u64,
        )?;

        let audio_player = std::env::var("VOXCHAT_AUDIO_PLAYER")
            .ok()
            .map(|cmd| {
                cmd.split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|parts| !parts.is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "WARN".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_base_url,
            ws_base_url,
            session_file,
            participant_name,
            reconnect: ReconnectPolicy::new(max_attempts, Duration::from_millis(delay_ms)),
            audio_player,
            log_level,
        })
    }

    /// Overrides the HTTP base; the WebSocket base follows it.
    pub fn with_api_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.api_base_url = validate_api_url(url)?;
        self.ws_base_url = derive_ws_url(&self.api_base_url);
        Ok(self)
    }

    pub fn chat_socket_url(&self) -> String {
        format!("{}/ws/chat", self.ws_base_url)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}' is not a number", raw))
        }),
        Err(_) => Ok(default),
    }
}

fn validate_api_url(url: &str) -> Result<String, ConfigError> {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(ConfigError::InvalidValue(
            "VOXCHAT_API_URL".to_string(),
            format!("'{}' must start with http:// or https://", url),
        ))
    }
}

fn validate_ws_url(url: &str) -> Result<String, ConfigError> {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url.to_string())
    } else {
        Err(ConfigError::InvalidValue(
            "VOXCHAT_WS_URL".to_string(),
            format!("'{}' must start with ws:// or wss://", url),
        ))
    }
}

/// `http` maps to `ws` and `https` to `wss`; the rest of the URL is kept.
fn derive_ws_url(api_base_url: &str) -> String {
    if let Some(rest) = api_base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        api_base_url.to_string()
    }
}

fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("voxchat").join("session_id"))
        .unwrap_or_else(|| PathBuf::from(".voxchat_session"))
}
