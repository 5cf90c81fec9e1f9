//! Mock session store for testing

use crate::session::SessionData;
use crate::storage::{SessionStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory store that keeps every saved snapshot
///
/// A failing store rejects every write, for exercising the
/// persistence-failure path.
#[derive(Clone, Default)]
pub struct MockSessionStore {
    pub saves: Arc<Mutex<Vec<SessionData>>>,
    pub replays: Arc<Mutex<Vec<String>>>,
    pub finalized: Arc<Mutex<bool>>,
    pub reserved: Arc<Mutex<HashSet<String>>>,
    should_fail: bool,
    save_delay: Option<Duration>,
    finalize_delay: Option<Duration>,
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Store whose every `save` takes `delay`
    pub fn with_save_delay(delay: Duration) -> Self {
        Self {
            save_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Store whose `finalize` takes `delay`, keeping an ending session busy
    pub fn with_finalize_delay(delay: Duration) -> Self {
        Self {
            finalize_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Most recently saved state
    pub fn last_saved(&self) -> Option<SessionData> {
        self.saves.lock().unwrap().last().cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn was_finalized(&self) -> bool {
        *self.finalized.lock().unwrap()
    }

    fn check(&self) -> StorageResult<()> {
        if self.should_fail {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mock failure",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    fn session_dir(&self, data: &SessionData) -> PathBuf {
        PathBuf::from("/mock").join(data.directory_name())
    }

    async fn reserve_dir(&self, data: &SessionData) -> StorageResult<String> {
        self.check()?;
        let base = data.timestamp_directory_name();
        let mut reserved = self.reserved.lock().unwrap();
        let mut name = base.clone();
        let mut attempt = 1;
        while reserved.contains(&name) {
            attempt += 1;
            name = format!("{base} ({attempt})");
        }
        reserved.insert(name.clone());
        Ok(name)
    }

    async fn save(&self, data: &SessionData) -> StorageResult<()> {
        if let Some(delay) = self.save_delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        self.saves.lock().unwrap().push(data.clone());
        Ok(())
    }

    async fn store_replay(
        &self,
        data: &SessionData,
        _source: &Path,
        file_name: &str,
    ) -> StorageResult<PathBuf> {
        self.check()?;
        self.replays.lock().unwrap().push(file_name.to_string());
        Ok(self.session_dir(data).join(file_name))
    }

    async fn finalize(&self, _data: &SessionData) -> StorageResult<()> {
        if let Some(delay) = self.finalize_delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        *self.finalized.lock().unwrap() = true;
        Ok(())
    }

    async fn list_sessions(&self) -> StorageResult<Vec<SessionData>> {
        let mut sessions = self.saves.lock().unwrap().clone();
        sessions.reverse();
        sessions.dedup_by(|a, b| a.started_at == b.started_at);
        Ok(sessions)
    }
}
