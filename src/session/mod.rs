//! Timed randomizer sessions
//!
//! A session repeatedly requests a random map, validates it and waits for
//! the player to finish or skip it until the time limit runs out. The
//! synchronous [`Session`] state machine holds the timers and budgets,
//! the orchestrator task drives it from external signals, and
//! [`SessionManager`] is the handle applications talk to.

pub mod config;
pub mod data;
pub mod events;
pub mod manager;
mod orchestrator;
pub mod state;

pub use config::SessionSettings;
pub use data::{MapResult, ReplayRecord, SessionData, SessionDataMap};
pub use events::{EndReason, SessionEvent, SessionSignal};
pub use manager::{SessionManager, StartOutcome};
pub use orchestrator::{SessionOutcome, SessionServices};
pub use state::{
    Medal, Session, SessionError, SessionMap, SessionPhase, SkipBudgetPolicy, SkipKind,
};

use std::time::Duration;

/// Format a duration as `h:mm:ss`
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
