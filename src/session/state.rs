//! Session state machine implementation
//!
//! [`Session`] is the synchronous core owned by the orchestrator task: it
//! applies results, skips and replay attributions to the timers, budgets and
//! map collections, and keeps the persisted [`SessionData`] mirror current.
//! It never performs I/O.

use super::data::{MapResult, ReplayRecord, SessionData, SessionDataMap};
use crate::rules::RandomizerRules;
use crate::validate::MapInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Orchestrator phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No session exists yet
    Idle,
    Requesting,
    Downloading,
    Validating,
    /// Driven by external signals until a result, skip, time-out or cancel
    AwaitingResult,
    /// Final flush in progress
    Ending,
    /// Terminal
    Ended,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        self == SessionPhase::Ended
    }

    /// Whether `next` may follow this phase
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        match (self, next) {
            (Ended, _) => false,
            (Ending, Ended) => true,
            (Ending, _) => false,
            (_, Ending) => true,
            (Idle, Requesting) => true,
            (Requesting, Downloading) => true,
            (Downloading, Validating | Requesting) => true,
            (Validating, AwaitingResult | Requesting) => true,
            (AwaitingResult, Requesting) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Completion tiers that finish a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Medal {
    Author,
    Gold,
}

impl Medal {
    pub fn result(self) -> MapResult {
        match self {
            Medal::Author => MapResult::AuthorMedal,
            Medal::Gold => MapResult::GoldMedal,
        }
    }
}

/// Which budget a skip draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipKind {
    Free,
    Gold,
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipKind::Free => f.write_str("free"),
            SkipKind::Gold => f.write_str("gold"),
        }
    }
}

/// When skips move from the free budget to the gold budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipBudgetPolicy {
    /// Once any gold-or-better result exists in the session
    #[default]
    AfterFirstGold,
    /// Every skip uses the free budget
    FreeOnly,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("The {kind} skip limit of {limit} has been reached")]
    SkipBudgetExhausted { kind: SkipKind, limit: u32 },

    #[error("No map is currently being played")]
    NoCurrentMap,

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition {
        from: SessionPhase,
        to: SessionPhase,
    },
}

/// One accepted map and what happened on it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMap {
    pub map_uid: String,
    pub map: MapInfo,
    /// Time spent on the map when it was last observed
    pub last_timestamp: Duration,
    pub replays: Vec<ReplayRecord>,
}

impl SessionMap {
    pub fn new(map: MapInfo) -> Self {
        Self {
            map_uid: map.uid.clone(),
            map,
            last_timestamp: Duration::ZERO,
            replays: Vec::new(),
        }
    }
}

/// Runtime state of a single session
#[derive(Debug)]
pub struct Session {
    phase: SessionPhase,
    original_time_limit: Duration,
    remaining: Duration,
    played: Duration,
    current_map: Option<SessionMap>,
    author_maps: Vec<SessionMap>,
    gold_maps: Vec<SessionMap>,
    skipped_maps: Vec<SessionMap>,
    free_skips_used: u32,
    gold_skips_used: u32,
    cancellation_requested: bool,
    survival_bonus: Option<Duration>,
    free_skip_limit: Option<u32>,
    gold_skip_limit: Option<u32>,
    skip_policy: SkipBudgetPolicy,
    data: SessionData,
}

impl Session {
    /// Create a session from a rules snapshot; the time limit is copied once
    pub fn new(rules: &RandomizerRules, policy: SkipBudgetPolicy, started_at: DateTime<Utc>) -> Self {
        let request = &rules.request_rules;
        Self {
            phase: SessionPhase::Idle,
            original_time_limit: rules.time_limit,
            remaining: rules.time_limit,
            played: Duration::ZERO,
            current_map: None,
            author_maps: Vec::new(),
            gold_maps: Vec::new(),
            skipped_maps: Vec::new(),
            free_skips_used: 0,
            gold_skips_used: 0,
            cancellation_requested: false,
            survival_bonus: request.effective_survival_bonus(),
            free_skip_limit: request.free_skip_limit,
            gold_skip_limit: request.gold_skip_limit,
            skip_policy: policy,
            data: SessionData::new(started_at, rules.clone()),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.data.started_at
    }

    pub fn original_time_limit(&self) -> Duration {
        self.original_time_limit
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Time spent on maps so far
    pub fn played(&self) -> Duration {
        self.played
    }

    pub fn current_map(&self) -> Option<&SessionMap> {
        self.current_map.as_ref()
    }

    pub fn author_maps(&self) -> &[SessionMap] {
        &self.author_maps
    }

    pub fn gold_maps(&self) -> &[SessionMap] {
        &self.gold_maps
    }

    pub fn skipped_maps(&self) -> &[SessionMap] {
        &self.skipped_maps
    }

    pub fn free_skips_used(&self) -> u32 {
        self.free_skips_used
    }

    pub fn gold_skips_used(&self) -> u32 {
        self.gold_skips_used
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Store the session under a reserved directory name
    pub fn assign_directory(&mut self, name: impl Into<String>) {
        self.data.directory = Some(name.into());
    }

    pub fn is_time_expired(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.cancellation_requested
    }

    /// Set once; never cleared
    pub fn request_cancellation(&mut self) {
        self.cancellation_requested = true;
    }

    pub fn transition(&mut self, next: SessionPhase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Deduct time spent playing
    pub fn consume(&mut self, elapsed: Duration) {
        let spent = elapsed.min(self.remaining);
        self.remaining -= spent;
        self.played += spent;
    }

    /// Make a validated map the current one and start waiting for a result
    pub fn accept_map(&mut self, map: MapInfo) -> Result<&SessionMap, SessionError> {
        self.transition(SessionPhase::AwaitingResult)?;
        self.data.maps.push(SessionDataMap::new(&map));
        Ok(self.current_map.insert(SessionMap::new(map)))
    }

    /// Finish the current map with a medal
    ///
    /// The elapsed time is deducted first; in survival mode the bonus is then
    /// added back without clamping.
    pub fn record_medal(
        &mut self,
        medal: Medal,
        elapsed: Duration,
    ) -> Result<SessionMap, SessionError> {
        if self.current_map.is_none() {
            return Err(SessionError::NoCurrentMap);
        }
        self.transition(SessionPhase::Requesting)?;
        let mut map = self.current_map.take().ok_or(SessionError::NoCurrentMap)?;

        self.consume(elapsed);
        if let Some(bonus) = self.survival_bonus {
            self.remaining += bonus;
        }

        map.last_timestamp = elapsed;
        self.data.set_result(&map, medal.result());

        match medal {
            Medal::Author => self.author_maps.push(map.clone()),
            Medal::Gold => self.gold_maps.push(map.clone()),
        }
        self.data.author_rate = self.author_rate();
        Ok(map)
    }

    /// Budget the next skip would draw from
    pub fn next_skip_kind(&self) -> SkipKind {
        let has_gold = !self.gold_maps.is_empty() || !self.author_maps.is_empty();
        match self.skip_policy {
            SkipBudgetPolicy::AfterFirstGold if has_gold => SkipKind::Gold,
            _ => SkipKind::Free,
        }
    }

    /// Skip the current map, drawing from the applicable budget
    ///
    /// A skip past the budget is refused; the caller ends the session.
    pub fn skip(&mut self, elapsed: Duration) -> Result<(SkipKind, SessionMap), SessionError> {
        if self.current_map.is_none() {
            return Err(SessionError::NoCurrentMap);
        }

        let kind = self.next_skip_kind();
        let (used, limit) = match kind {
            SkipKind::Free => (self.free_skips_used, self.free_skip_limit),
            SkipKind::Gold => (self.gold_skips_used, self.gold_skip_limit),
        };
        if let Some(limit) = limit {
            if used >= limit {
                return Err(SessionError::SkipBudgetExhausted { kind, limit });
            }
        }

        self.transition(SessionPhase::Requesting)?;
        let mut map = self.current_map.take().ok_or(SessionError::NoCurrentMap)?;
        match kind {
            SkipKind::Free => self.free_skips_used += 1,
            SkipKind::Gold => self.gold_skips_used += 1,
        }

        self.consume(elapsed);
        map.last_timestamp = elapsed;
        self.data.set_result(&map, MapResult::Skipped);
        self.skipped_maps.push(map.clone());
        Ok((kind, map))
    }

    /// Append a replay to the current map if the uid matches
    ///
    /// Returns false when no map is current or the replay belongs to another map.
    pub fn attribute_replay(&mut self, map_uid: &str, replay: ReplayRecord) -> bool {
        let Some(map) = self.current_map.as_mut() else {
            return false;
        };
        if map.map_uid != map_uid {
            return false;
        }
        map.last_timestamp = replay.timestamp;
        self.data.add_replay(map_uid, replay.clone());
        map.replays.push(replay);
        true
    }

    /// Author medals per hour of the original time limit
    pub fn author_rate(&self) -> f64 {
        let hours = self.original_time_limit.as_secs_f64() / 3600.0;
        if hours == 0.0 {
            return 0.0;
        }
        self.author_maps.len() as f64 / hours
    }
}
