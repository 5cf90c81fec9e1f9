//! Testing utilities and fixtures
//!
//! GBX file builders, collaborator mocks, and a ready-made set of session
//! services with short delays so orchestrator tests finish quickly.

pub mod gbx;
pub mod mocks;

use crate::autosave::AutosaveReconciler;
use crate::fetch::{MapFetcher, RetryPolicy};
use crate::session::{SessionServices, SessionSettings};
use crate::storage::SessionStore;
use crate::validate::HeaderMapValidator;
use std::sync::Arc;
use std::time::Duration;

/// Session services backed by the given fetcher and store
///
/// Uses the header validator, a single fetch attempt per cycle, a 10ms
/// failure cooldown and no download or autosave directories.
pub fn test_services(
    fetcher: Arc<dyn MapFetcher>,
    store: Arc<dyn SessionStore>,
) -> SessionServices {
    SessionServices {
        fetcher,
        validator: Arc::new(HeaderMapValidator),
        store,
        reconciler: AutosaveReconciler::default(),
        retry: RetryPolicy {
            attempts: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            jitter_factor: 0.0,
        },
        settings: SessionSettings {
            end_grace_period: Duration::from_secs(5),
            failure_cooldown: Duration::from_millis(10),
            seed: Some(7),
            ..SessionSettings::default()
        },
        downloaded_dir: None,
        autosaves_dir: None,
    }
}
