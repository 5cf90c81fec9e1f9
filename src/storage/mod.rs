//! Session persistence
//!
//! One directory per session under the sessions root, named by the local
//! start time. Each holds the `Session.yml` metadata file, rewritten
//! wholesale on every change through a temp file and rename, and a
//! `Replays` subdirectory with copied replay files.

pub mod downloads;
pub mod error;
pub mod history;

pub use downloads::save_downloaded_map;
pub use error::{StorageError, StorageResult};
pub use history::{rank_best_sessions, SessionSummary};

use crate::session::SessionData;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Name of the session metadata file
pub const SESSION_FILE: &str = "Session.yml";

/// Name of the replay subdirectory inside a session directory
pub const REPLAYS_DIR: &str = "Replays";

/// Numbered alternatives tried when a session directory name is taken
const MAX_DIRECTORY_ATTEMPTS: u32 = 100;

/// Persistence contract used by the orchestrator
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Directory the session's files live in
    fn session_dir(&self, data: &SessionData) -> PathBuf;

    /// Claim a directory no other session uses and return its name
    ///
    /// Sessions started within the same second get numbered names.
    async fn reserve_dir(&self, data: &SessionData) -> StorageResult<String>;

    /// Replace the session metadata file with the current state
    async fn save(&self, data: &SessionData) -> StorageResult<()>;

    /// Copy a replay into the session's replay directory
    async fn store_replay(
        &self,
        data: &SessionData,
        source: &Path,
        file_name: &str,
    ) -> StorageResult<PathBuf>;

    /// Mark the session's metadata read-only
    async fn finalize(&self, data: &SessionData) -> StorageResult<()>;

    /// Every readable session, newest first
    async fn list_sessions(&self) -> StorageResult<Vec<SessionData>>;
}

/// File-system store rooted at the sessions directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn load(&self, directory_name: &str) -> StorageResult<SessionData> {
        let path = self.root.join(directory_name).join(SESSION_FILE);
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Write a file by writing a sibling temp file and renaming it into place
pub async fn write_atomic(path: &Path, content: &[u8]) -> StorageResult<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, content).await?;
    fs::rename(&temp, path).await?;
    Ok(())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn session_dir(&self, data: &SessionData) -> PathBuf {
        self.root.join(data.directory_name())
    }

    async fn reserve_dir(&self, data: &SessionData) -> StorageResult<String> {
        fs::create_dir_all(&self.root).await?;
        let base = data.timestamp_directory_name();

        for attempt in 1..=MAX_DIRECTORY_ATTEMPTS {
            let name = match attempt {
                1 => base.clone(),
                n => format!("{base} ({n})"),
            };
            match fs::create_dir(self.root.join(&name)).await {
                Ok(()) => return Ok(name),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("Session directory {name} is taken");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free session directory for {base}"),
        )))
    }

    async fn save(&self, data: &SessionData) -> StorageResult<()> {
        let dir = self.session_dir(data);
        fs::create_dir_all(&dir).await?;
        let yaml = serde_yaml::to_string(data)?;
        write_atomic(&dir.join(SESSION_FILE), yaml.as_bytes()).await?;
        debug!("Session data saved to {}", dir.display());
        Ok(())
    }

    async fn store_replay(
        &self,
        data: &SessionData,
        source: &Path,
        file_name: &str,
    ) -> StorageResult<PathBuf> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(StorageError::InvalidName(file_name.to_string()));
        }
        let dir = self.session_dir(data).join(REPLAYS_DIR);
        fs::create_dir_all(&dir).await?;
        let target = dir.join(file_name);
        fs::copy(source, &target).await?;
        Ok(target)
    }

    async fn finalize(&self, data: &SessionData) -> StorageResult<()> {
        let path = self.session_dir(data).join(SESSION_FILE);
        let mut permissions = fs::metadata(&path).await?.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).await?;
        Ok(())
    }

    async fn list_sessions(&self) -> StorageResult<Vec<SessionData>> {
        if !fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join(SESSION_FILE);
            if !fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_yaml::from_str::<SessionData>(&content) {
                    Ok(data) => sessions.push(data),
                    Err(e) => warn!("Skipping corrupt session file {}: {e}", path.display()),
                },
                Err(e) => warn!("Failed to read {}: {e}", path.display()),
            }
        }

        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }
}
