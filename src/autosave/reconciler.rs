use super::naming::{deformat, replay_file_name, DEFAULT_REPLAY_FILE_FORMAT};
use crate::gbx::ReplayHeader;
use crate::session::{Medal, ReplayRecord, Session};
use crate::storage::SessionStore;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to a detected replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No current map, or the replay belongs to another one
    Ignored,
    /// Copied and appended to the current map
    Attributed {
        file_name: String,
        /// Medal the replay's time earns on the current map
        medal: Option<Medal>,
    },
    /// Matched the current map but could not be copied; the medal still counts
    CopyFailed {
        file_name: String,
        medal: Option<Medal>,
        error: String,
    },
}

/// Attributes autosaved replays to the map in play
#[derive(Debug, Clone)]
pub struct AutosaveReconciler {
    replay_file_format: String,
}

impl Default for AutosaveReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_FILE_FORMAT)
    }
}

impl AutosaveReconciler {
    pub fn new(replay_file_format: impl Into<String>) -> Self {
        Self {
            replay_file_format: replay_file_format.into(),
        }
    }

    /// Match a replay against the current map by uid only
    ///
    /// On a match the file is copied into the session's replay directory and
    /// recorded on the map; saving the session data is left to the caller.
    /// A failed copy leaves the map's replay list alone but still reports the
    /// medal. Non-matching files are left untouched.
    pub async fn reconcile(
        &self,
        session: &mut Session,
        store: &dyn SessionStore,
        path: &Path,
        header: &ReplayHeader,
        elapsed: Duration,
    ) -> Reconciliation {
        let Some(map) = session.current_map() else {
            debug!("Ignoring replay {}: no map in play", path.display());
            return Reconciliation::Ignored;
        };
        if map.map_uid != header.map_uid {
            debug!(
                "Ignoring replay {} for map {} (playing {})",
                path.display(),
                header.map_uid,
                map.map_uid
            );
            return Reconciliation::Ignored;
        }

        let map_info = map.map.clone();
        let time = header.time.unwrap_or_default();
        let player = header
            .player_login
            .clone()
            .filter(|login| !login.is_empty())
            .unwrap_or_else(|| deformat(&header.player_nickname));
        let file_name = replay_file_name(&self.replay_file_format, &map_info.name, time, &player);

        let medal = if map_info.is_stunts() {
            None
        } else {
            header.time.and_then(|time| medal_for(time, map_info.author_time, map_info.gold_time))
        };

        if let Err(e) = store.store_replay(session.data(), path, &file_name).await {
            warn!("Failed to copy replay {} into the session: {e}", path.display());
            return Reconciliation::CopyFailed {
                file_name,
                medal,
                error: e.to_string(),
            };
        }
        session.attribute_replay(
            &header.map_uid,
            ReplayRecord {
                file_name: file_name.clone(),
                timestamp: elapsed,
            },
        );
        info!("Replay attributed to {}: {file_name}", map_info.name);

        Reconciliation::Attributed { file_name, medal }
    }
}

/// Medal earned by a finish time
pub fn medal_for(time: Duration, author: Option<Duration>, gold: Option<Duration>) -> Option<Medal> {
    if author.is_some_and(|author| time <= author) {
        Some(Medal::Author)
    } else if gold.is_some_and(|gold| time <= gold) {
        Some(Medal::Gold)
    } else {
        None
    }
}
