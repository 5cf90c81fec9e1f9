//! The per-session background task
//!
//! Runs Requesting → Downloading → Validating → AwaitingResult until the
//! session is cancelled, the timer runs out, a skip budget is exhausted or
//! the rules turn out unsatisfiable. External inputs arrive through one
//! ordered signal queue; cancellation is a watch flag checked first at every
//! suspension point.

use super::config::SessionSettings;
use super::data::SessionData;
use super::events::{EndReason, SessionEvent, SessionSignal};
use super::state::{Medal, Session, SessionError, SessionPhase};
use crate::autosave::{AutosaveReconciler, Reconciliation};
use crate::fetch::{fetch_with_retry, MapFetcher, RetryPolicy};
use crate::request::build_request;
use crate::rules::RandomizerRules;
use crate::storage::{save_downloaded_map, SessionStore};
use crate::validate::MapValidator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Collaborators and settings shared by every session
#[derive(Clone)]
pub struct SessionServices {
    pub fetcher: Arc<dyn MapFetcher>,
    pub validator: Arc<dyn MapValidator>,
    pub store: Arc<dyn SessionStore>,
    pub reconciler: AutosaveReconciler,
    pub retry: RetryPolicy,
    pub settings: SessionSettings,
    /// Where accepted maps are written for the game to open
    pub downloaded_dir: Option<PathBuf>,
    /// Directory the game writes autosaved replays to
    pub autosaves_dir: Option<PathBuf>,
}

/// Final state handed back when a session ends
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub reason: EndReason,
    pub data: SessionData,
}

enum Attempt {
    /// The map got a result or was skipped; request the next one
    Finished,
    End(EndReason),
}

enum Wake {
    Cancelled,
    TimedOut,
    Signal(Option<SessionSignal>),
}

pub(crate) struct SessionOrchestrator {
    session: Session,
    rules: RandomizerRules,
    services: SessionServices,
    rng: StdRng,
    signals: mpsc::Receiver<SessionSignal>,
    cancel: watch::Receiver<bool>,
    events: broadcast::Sender<SessionEvent>,
}

/// Resolves once cancellation is requested or its sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|requested| *requested).await;
}

impl SessionOrchestrator {
    pub(crate) fn new(
        session: Session,
        rules: RandomizerRules,
        services: SessionServices,
        signals: mpsc::Receiver<SessionSignal>,
        cancel: watch::Receiver<bool>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let rng = match services.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            session,
            rules,
            services,
            rng,
            signals,
            cancel,
            events,
        }
    }

    pub(crate) async fn run(mut self) -> SessionOutcome {
        let directory = self.services.store.session_dir(self.session.data());
        info!("Session started, storing data in {}", directory.display());
        self.persist().await;
        self.emit(SessionEvent::Started { directory });

        let reason = match self.run_loop().await {
            Ok(reason) => reason,
            Err(e) => {
                error!("Session aborted: {e}");
                EndReason::Failed(e.to_string())
            }
        };
        self.finish(reason).await
    }

    async fn run_loop(&mut self) -> Result<EndReason, SessionError> {
        self.enter(SessionPhase::Requesting)?;

        loop {
            if self.is_cancelled() {
                return Ok(EndReason::Cancelled);
            }
            if self.session.is_time_expired() {
                return Ok(EndReason::TimeExpired);
            }

            let request = match build_request(&self.rules.request_rules, &mut self.rng) {
                Ok(request) => request,
                Err(e) => {
                    error!("Cannot build a request: {e}");
                    return Ok(EndReason::Unsatisfiable(e.to_string()));
                }
            };
            info!(site = %request.site, "Requesting {}", request.url);

            self.enter(SessionPhase::Downloading)?;
            let fetched = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => None,
                result = fetch_with_retry(
                    self.services.fetcher.as_ref(),
                    &request.url,
                    &self.services.retry,
                ) => Some(result),
            };
            let artifact = match fetched {
                None => return Ok(EndReason::Cancelled),
                Some(Ok(artifact)) => artifact,
                Some(Err(e)) => {
                    warn!("Map could not be obtained: {e}");
                    if self.map_unavailable(e.to_string()).await? {
                        return Ok(EndReason::Cancelled);
                    }
                    continue;
                }
            };

            self.enter(SessionPhase::Validating)?;
            let info = match self
                .services
                .validator
                .validate(&artifact, &self.rules)
                .await
            {
                Ok(info) => info,
                Err(e) => {
                    warn!("Map {} failed validation: {e}", artifact.file_name);
                    if self.map_unavailable(e.to_string()).await? {
                        return Ok(EndReason::Cancelled);
                    }
                    continue;
                }
            };

            let path = match &self.services.downloaded_dir {
                Some(dir) => match save_downloaded_map(dir, &artifact).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        self.persistence_failed(format!("downloaded map: {e}"));
                        None
                    }
                },
                None => None,
            };

            self.session.accept_map(info.clone())?;
            self.drain_stale_signals();
            info!("Map accepted: {} ({})", info.name, info.uid);
            self.persist().await;
            self.emit(SessionEvent::MapAccepted { map: info, path });

            match self.await_result().await? {
                Attempt::Finished => continue,
                Attempt::End(reason) => return Ok(reason),
            }
        }
    }

    /// Wait on the current map until it is finished, skipped, timed out or cancelled
    async fn await_result(&mut self) -> Result<Attempt, SessionError> {
        let started = Instant::now();
        let timer = tokio::time::sleep_until(started + self.session.remaining());
        tokio::pin!(timer);

        loop {
            let wake = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => Wake::Cancelled,
                _ = &mut timer => Wake::TimedOut,
                signal = self.signals.recv() => Wake::Signal(signal),
            };
            let elapsed = started.elapsed();

            let signal = match wake {
                Wake::Cancelled | Wake::Signal(None) => {
                    self.session.consume(elapsed);
                    return Ok(Attempt::End(EndReason::Cancelled));
                }
                Wake::TimedOut => {
                    self.session.consume(self.session.remaining());
                    info!("Session time is up");
                    return Ok(Attempt::End(EndReason::TimeExpired));
                }
                Wake::Signal(Some(signal)) => signal,
            };

            match signal {
                SessionSignal::MedalAchieved { map_uid, medal } => {
                    if self.is_current(&map_uid) {
                        return self.complete(medal, elapsed).await;
                    }
                    debug!("Ignoring {medal:?} medal for map {map_uid} that is not in play");
                }
                SessionSignal::Skip => return self.skip(elapsed).await,
                SessionSignal::ReplayDetected { path, header } => {
                    let reconciled = self
                        .services
                        .reconciler
                        .reconcile(
                            &mut self.session,
                            self.services.store.as_ref(),
                            &path,
                            &header,
                            elapsed,
                        )
                        .await;
                    let medal = match reconciled {
                        Reconciliation::Ignored => None,
                        Reconciliation::Attributed { file_name, medal } => {
                            self.persist().await;
                            self.emit(SessionEvent::ReplayAttributed {
                                map_uid: header.map_uid.clone(),
                                file_name,
                            });
                            medal
                        }
                        Reconciliation::CopyFailed {
                            file_name,
                            medal,
                            error,
                        } => {
                            self.persistence_failed(format!("replay copy {file_name}: {error}"));
                            medal
                        }
                    };
                    if let Some(medal) = medal {
                        return self.complete(medal, elapsed).await;
                    }
                }
            }
        }
    }

    async fn complete(
        &mut self,
        medal: Medal,
        elapsed: std::time::Duration,
    ) -> Result<Attempt, SessionError> {
        let map = self.session.record_medal(medal, elapsed)?;
        let remaining = self.session.remaining();
        info!(
            "{medal:?} medal on {} after {}, {} remaining",
            map.map.name,
            super::format_clock(elapsed),
            super::format_clock(remaining)
        );
        self.persist().await;
        self.emit(SessionEvent::ResultRecorded {
            map_uid: map.map_uid,
            result: medal.result(),
            remaining,
        });
        Ok(Attempt::Finished)
    }

    async fn skip(&mut self, elapsed: std::time::Duration) -> Result<Attempt, SessionError> {
        match self.session.skip(elapsed) {
            Ok((kind, map)) => {
                info!("Skipped {} ({kind} skip)", map.map.name);
                self.persist().await;
                self.emit(SessionEvent::MapSkipped {
                    map_uid: map.map_uid,
                    kind,
                });
                Ok(Attempt::Finished)
            }
            Err(e @ SessionError::SkipBudgetExhausted { .. }) => {
                warn!("{e}");
                self.session.consume(elapsed);
                Ok(Attempt::End(EndReason::SkipBudgetExhausted))
            }
            Err(e) => Err(e),
        }
    }

    /// Report a failed cycle and wait out the cooldown; true when cancelled meanwhile
    async fn map_unavailable(&mut self, reason: String) -> Result<bool, SessionError> {
        self.emit(SessionEvent::MapUnavailable { reason });
        self.enter(SessionPhase::Requesting)?;

        let cooldown = self.services.settings.failure_cooldown;
        let was_cancelled = tokio::select! {
            biased;
            _ = cancelled(&mut self.cancel) => true,
            _ = tokio::time::sleep(cooldown) => false,
        };
        Ok(was_cancelled)
    }

    async fn finish(mut self, reason: EndReason) -> SessionOutcome {
        if reason == EndReason::Cancelled {
            self.session.request_cancellation();
        }
        if let Err(e) = self.session.transition(SessionPhase::Ending) {
            error!("{e}");
        }

        self.persist().await;
        if let Err(e) = self.services.store.finalize(self.session.data()).await {
            warn!("Failed to mark session data read-only: {e}");
            self.persistence_failed(e.to_string());
        }

        if let Err(e) = self.session.transition(SessionPhase::Ended) {
            error!("{e}");
        }
        info!(
            "Session ended ({reason:?}): {} author, {} gold, {} skipped",
            self.session.author_maps().len(),
            self.session.gold_maps().len(),
            self.session.skipped_maps().len()
        );
        self.emit(SessionEvent::SessionEnded {
            reason: reason.clone(),
        });

        SessionOutcome {
            reason,
            data: self.session.data().clone(),
        }
    }

    fn enter(&mut self, phase: SessionPhase) -> Result<(), SessionError> {
        debug!("Session phase {} -> {phase}", self.session.phase());
        self.session.transition(phase)
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn is_current(&self, map_uid: &str) -> bool {
        self.session
            .current_map()
            .is_some_and(|map| map.map_uid == map_uid)
    }

    /// Signals queued while no map was in play refer to an earlier map
    fn drain_stale_signals(&mut self) {
        while let Ok(signal) = self.signals.try_recv() {
            debug!("Dropping stale signal {signal:?}");
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.services.store.save(self.session.data()).await {
            warn!("Failed to save session data: {e}");
            self.persistence_failed(e.to_string());
        }
    }

    fn persistence_failed(&self, message: String) {
        self.emit(SessionEvent::PersistenceFailed { message });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
