//! Persistence of the session identifier between runs.

use crate::backend::ChatBackend;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use voxchat_core::SessionId;

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionId>>;
    fn save(&self, id: &SessionId) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores the identifier as the only line of a small text file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionId>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let id = contents.trim();
                Ok((!id.is_empty()).then(|| SessionId::new(id)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read session file {}", self.path.display())),
        }
    }

    fn save(&self, id: &SessionId) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory {}", parent.display())
            })?;
        }
        std::fs::write(&self.path, format!("{}\n", id))
            .with_context(|| format!("Failed to write session file {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove session file {}", self.path.display())),
        }
    }
}

/// Keeps the identifier in memory only.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    id: Mutex<Option<SessionId>>,
}

impl MemorySessionStore {
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id: Mutex::new(Some(id)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionId>> {
        Ok(self
            .id
            .lock()
            .map_err(|_| anyhow::anyhow!("session store poisoned"))?
            .clone())
    }

    fn save(&self, id: &SessionId) -> Result<()> {
        *self
            .id
            .lock()
            .map_err(|_| anyhow::anyhow!("session store poisoned"))? = Some(id.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .id
            .lock()
            .map_err(|_| anyhow::anyhow!("session store poisoned"))? = None;
        Ok(())
    }
}

/// Returns the stored session, asking the backend for a new one (and
/// persisting it) when none is stored yet.
pub async fn obtain_session(
    store: &dyn SessionStore,
    backend: &dyn ChatBackend,
) -> Result<SessionId> {
    if let Some(id) = store.load()? {
        info!(session_id = %id, "Resuming stored session.");
        return Ok(id);
    }
    let id = backend
        .start_session()
        .await
        .context("Failed to start a new session")?;
    store.save(&id)?;
    info!(session_id = %id, "Started new session.");
    Ok(id)
}
