//! Lifecycle events published by a session and signals fed into it

use super::data::MapResult;
use super::format_clock;
use super::state::{Medal, SkipKind};
use crate::gbx::ReplayHeader;
use crate::validate::MapInfo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Cancelled,
    TimeExpired,
    SkipBudgetExhausted,
    /// The rules cannot be satisfied by any site
    Unsatisfiable(String),
    /// The orchestrator hit an internal state error
    Failed(String),
}

impl EndReason {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EndReason::SkipBudgetExhausted | EndReason::Unsatisfiable(_) | EndReason::Failed(_)
        )
    }
}

/// Events any collaborator may subscribe to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    Started { directory: PathBuf },
    MapAccepted { map: MapInfo, path: Option<PathBuf> },
    ResultRecorded {
        map_uid: String,
        result: MapResult,
        #[serde(with = "humantime_serde")]
        remaining: Duration,
    },
    MapSkipped { map_uid: String, kind: SkipKind },
    ReplayAttributed { map_uid: String, file_name: String },
    PersistenceFailed { message: String },
    /// A cycle produced no playable map
    MapUnavailable { reason: String },
    SessionEnded { reason: EndReason },
}

impl SessionEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::Started { directory } => {
                format!("Session started in {}", directory.display())
            }
            SessionEvent::MapAccepted { map, .. } => format!("Now playing: {}", map.name),
            SessionEvent::ResultRecorded {
                result, remaining, ..
            } => format!(
                "{result:?} recorded, {} remaining",
                format_clock(*remaining)
            ),
            SessionEvent::MapSkipped { kind, .. } => format!("Map skipped ({kind} skip)"),
            SessionEvent::ReplayAttributed { file_name, .. } => {
                format!("Replay saved: {file_name}")
            }
            SessionEvent::PersistenceFailed { message } => {
                format!("Failed to save session data: {message}")
            }
            SessionEvent::MapUnavailable { reason } => format!("No map this time: {reason}"),
            SessionEvent::SessionEnded { reason } => format!("Session ended: {reason:?}"),
        }
    }

    /// Check if this event represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::SessionEnded { .. })
    }
}

/// External inputs funneled into the orchestrator's queue
#[derive(Debug, Clone)]
pub enum SessionSignal {
    /// Game-state observation: the player reached a medal on a map
    MedalAchieved { map_uid: String, medal: Medal },
    Skip,
    /// A new replay file appeared in the autosave directory
    ReplayDetected { path: PathBuf, header: ReplayHeader },
}
