//! Main Entrypoint for the Voxchat Terminal Client
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and command line.
//! 2. Initializing logging on stderr.
//! 3. Opening the session store and the backend client.
//! 4. Spawning the session controller, which resolves the session and its
//!    history and then owns the chat socket.
//! 5. Running the conversation view on stdin/stdout until the user quits.

use anyhow::Context;
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};
use voxchat_client::{
    audio::{AudioDeck, CommandSpeaker, SilentSpeaker, Speaker},
    backend::{ChatBackend, HttpBackend},
    clipboard::SystemClipboard,
    config::Config,
    session_store::{FileSessionStore, SessionStore},
    view::ConversationView,
    voice::VoiceCall,
    ws::SessionController,
};
use voxchat_core::reconnect::TokioClock;

/// Terminal chat client with streamed replies and spoken answers
#[derive(Parser)]
#[command(name = "voxchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTTP base URL of the chat backend (overrides VOXCHAT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// File holding the session identifier (overrides VOXCHAT_SESSION_FILE)
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// Forget the stored session and start a new one
    #[arg(long)]
    reset_session: bool,
}

/// Listens for the `Ctrl+C` signal to stop the client.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C.");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url).context("Invalid --api-url")?;
    }
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!(
        api = %config.api_base_url,
        socket = %config.chat_socket_url(),
        "Configuration loaded."
    );

    // --- 3. Open Session Store and Backend ---
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(&config.api_base_url));
    let store = FileSessionStore::new(&config.session_file);
    if cli.reset_session {
        store.clear()?;
        info!(path = %store.path().display(), "Cleared stored session.");
    }

    // --- 4. Spawn the Session Controller ---
    let (controller, handle) = SessionController::bootstrapping(
        Arc::new(store),
        backend.clone(),
        config.chat_socket_url(),
        config.reconnect,
        Arc::new(TokioClock),
    );
    let controller_task = tokio::spawn(controller.run());

    // --- 5. Run the View ---
    let player = config.audio_player.clone().and_then(CommandSpeaker::new);
    let speaker: Box<dyn Speaker> = match player {
        Some(speaker) => Box::new(speaker),
        None => Box::new(SilentSpeaker::default()),
    };
    let mut view = ConversationView::new(
        handle.clone(),
        backend.clone(),
        VoiceCall::new(config.participant_name.clone()),
        AudioDeck::new(speaker, config.api_base_url.clone()),
        Box::new(SystemClipboard::default()),
        std::io::stdout(),
    );
    println!("Type /help for commands.");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = view.run(stdin) => result?,
        _ = shutdown_signal() => {}
    }

    handle.shutdown().await;
    controller_task.await.context("Session controller panicked")?;
    info!("Client has shut down.");
    Ok(())
}
