//! Durable projection of a session (`Session.yml`)

use super::state::SessionMap;
use crate::rules::RandomizerRules;
use crate::validate::MapInfo;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Format of a session directory name
pub const SESSION_DIRECTORY_FORMAT: &str = "%Y-%m-%d %H_%M_%S";

/// Outcome recorded for a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapResult {
    AuthorMedal,
    GoldMedal,
    Skipped,
}

/// A replay copied into the session's storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub file_name: String,
    /// Time spent on the map when the replay appeared
    #[serde(with = "humantime_serde")]
    pub timestamp: Duration,
}

/// Per-map entry of [`SessionData`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDataMap {
    pub name: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
    #[serde(default)]
    pub result: Option<MapResult>,
    #[serde(default, with = "humantime_serde")]
    pub last_timestamp: Option<Duration>,
    #[serde(default)]
    pub replays: Vec<ReplayRecord>,
}

impl SessionDataMap {
    pub fn new(map: &MapInfo) -> Self {
        Self {
            name: map.name.clone(),
            uid: map.uid.clone(),
            track_id: map.track_id,
            result: None,
            last_timestamp: None,
            replays: Vec::new(),
        }
    }
}

/// Everything written to a session's metadata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub version: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Directory reserved for the session when it differs from the start time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Captured once at start; never recomputed from live configuration
    #[serde(with = "humantime_serde")]
    pub original_time_limit: Duration,
    #[serde(default)]
    pub author_rate: f64,
    pub rules: RandomizerRules,
    #[serde(default)]
    pub maps: Vec<SessionDataMap>,
}

impl SessionData {
    pub fn new(started_at: DateTime<Utc>, rules: RandomizerRules) -> Self {
        Self {
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            started_at,
            directory: None,
            original_time_limit: rules.time_limit,
            author_rate: 0.0,
            rules,
            maps: Vec::new(),
        }
    }

    /// Directory name of the session
    ///
    /// The reserved name when one was assigned, otherwise the local start time.
    pub fn directory_name(&self) -> String {
        self.directory
            .clone()
            .unwrap_or_else(|| self.timestamp_directory_name())
    }

    /// Directory name derived from the local start time alone
    pub fn timestamp_directory_name(&self) -> String {
        self.started_at
            .with_timezone(&Local)
            .format(SESSION_DIRECTORY_FORMAT)
            .to_string()
    }

    fn map_mut(&mut self, uid: &str) -> Option<&mut SessionDataMap> {
        // The same map can be drawn twice; the latest entry is the live one
        self.maps.iter_mut().rev().find(|m| m.uid == uid)
    }

    pub(crate) fn set_result(&mut self, map: &SessionMap, result: MapResult) {
        if let Some(entry) = self.map_mut(&map.map_uid) {
            entry.result = Some(result);
            entry.last_timestamp = Some(map.last_timestamp);
        }
    }

    pub(crate) fn add_replay(&mut self, uid: &str, replay: ReplayRecord) {
        if let Some(entry) = self.map_mut(uid) {
            entry.last_timestamp = Some(replay.timestamp);
            entry.replays.push(replay);
        }
    }

    pub fn count(&self, result: MapResult) -> usize {
        self.maps.iter().filter(|m| m.result == Some(result)).count()
    }
}
