//! Session manager implementation
//!
//! Owns at most one running session: spawns its orchestrator task, routes
//! skip requests and game observations into its signal queue, and ends it
//! with a bounded wait.

use super::events::{SessionEvent, SessionSignal};
use super::orchestrator::{SessionOrchestrator, SessionOutcome, SessionServices};
use super::state::{Medal, Session};
use crate::autosave::AutosaveWatcher;
use crate::error::{ErrorCode, RandomizerError, Result};
use crate::rules::{validate_rules, RandomizerRules};
use chrono::Utc;
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

/// Pending signals a session may hold before senders wait
const SIGNAL_QUEUE_CAPACITY: usize = 64;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Result of asking for a new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { directory: PathBuf },
    /// A session is active; nothing was started
    AlreadyRunning,
}

struct SessionHandle {
    directory: PathBuf,
    signals: mpsc::Sender<SessionSignal>,
    cancel: watch::Sender<bool>,
    status: AbortHandle,
    /// Taken by the caller waiting for the session to end
    task: Option<JoinHandle<SessionOutcome>>,
}

impl SessionHandle {
    /// True until the orchestrator task returns, including while it is ending
    fn is_running(&self) -> bool {
        !self.status.is_finished()
    }

    fn is_ending(&self) -> bool {
        self.task.is_none()
    }
}

/// Entry point for starting, driving and ending sessions
pub struct SessionManager {
    services: SessionServices,
    events: broadcast::Sender<SessionEvent>,
    active: Mutex<Option<SessionHandle>>,
}

impl SessionManager {
    pub fn new(services: SessionServices) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            services,
            events,
            active: Mutex::new(None),
        }
    }

    /// Receive every event published by current and future sessions
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(SessionHandle::is_running)
    }

    /// Start a session from a snapshot of the rules
    ///
    /// Invalid rules are refused before anything is spawned. Starting while
    /// a session is active or still ending does nothing.
    pub async fn start_session(&self, rules: RandomizerRules) -> Result<StartOutcome> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(SessionHandle::is_running) {
            debug!("Session start ignored, one is already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        validate_rules(&rules)?;

        let mut session = Session::new(
            &rules,
            self.services.settings.skip_budget_policy,
            Utc::now(),
        );
        match self.services.store.reserve_dir(session.data()).await {
            Ok(name) => session.assign_directory(name),
            Err(e) => warn!("Could not reserve a session directory, saving will retry: {e}"),
        }
        let directory = self.services.store.session_dir(session.data());

        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_QUEUE_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let watcher = match &self.services.autosaves_dir {
            Some(dir) => match AutosaveWatcher::start(dir, signal_tx.clone()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!(
                        "Replays will not be collected, cannot watch {}: {e}",
                        dir.display()
                    );
                    None
                }
            },
            None => None,
        };

        let orchestrator = SessionOrchestrator::new(
            session,
            rules,
            self.services.clone(),
            signal_rx,
            cancel_rx,
            self.events.clone(),
        );
        let task = tokio::spawn(async move {
            // Replays are collected only while the orchestrator runs
            let _watcher = watcher;
            orchestrator.run().await
        });

        *active = Some(SessionHandle {
            directory: directory.clone(),
            signals: signal_tx,
            cancel: cancel_tx,
            status: task.abort_handle(),
            task: Some(task),
        });
        info!("Started session in {}", directory.display());
        Ok(StartOutcome::Started { directory })
    }

    /// Queue a signal for the running session
    pub async fn signal(&self, signal: SessionSignal) -> Result<()> {
        let sender = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(handle) if handle.is_running() && !handle.is_ending() => {
                    handle.signals.clone()
                }
                _ => return Err(not_running()),
            }
        };
        sender.send(signal).await.map_err(|_| not_running())
    }

    /// Skip the map being played
    pub async fn skip(&self) -> Result<()> {
        self.signal(SessionSignal::Skip).await
    }

    /// Report that the player reached a medal on a map
    pub async fn report_medal(&self, map_uid: impl Into<String>, medal: Medal) -> Result<()> {
        self.signal(SessionSignal::MedalAchieved {
            map_uid: map_uid.into(),
            medal,
        })
        .await
    }

    /// Cancel the session and wait up to the grace period for it to wrap up
    ///
    /// Returns `None` when no session exists, another caller is already
    /// ending it, or the task did not finish in time. A late task keeps
    /// running detached and still counts as active until it returns.
    pub async fn end_session(&self) -> Option<SessionOutcome> {
        let (mut task, directory) = {
            let mut active = self.active.lock().await;
            let handle = active.as_mut()?;
            let task = handle.task.take()?;
            // A finished task has already dropped its receiver
            let _ = handle.cancel.send(true);
            (task, handle.directory.clone())
        };

        let grace = self.services.settings.end_grace_period;
        let joined = match tokio::time::timeout(grace, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    "Session did not finish within {:?}, leaving it to finish in the background",
                    grace
                );
                return None;
            }
        };

        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|h| h.directory == directory) {
            *active = None;
        }
        drop(active);

        match joined {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Session task failed: {e}");
                None
            }
        }
    }
}

fn not_running() -> RandomizerError {
    RandomizerError::Session {
        code: ErrorCode::SESSION_NOT_RUNNING,
        message: "No session is running".to_string(),
    }
}
