use crate::gbx::read_replay_header;
use crate::session::SessionSignal;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause after a file event so the game can finish writing the replay
const SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Watches the game's autosave directory and forwards new replays
///
/// Every created or modified `*.Replay.Gbx` file whose header can be read
/// becomes a [`SessionSignal::ReplayDetected`]. Dropping the watcher stops it.
pub struct AutosaveWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl AutosaveWatcher {
    pub fn start(dir: &Path, signals: mpsc::Sender<SessionSignal>) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in event.paths.into_iter().filter(|p| is_replay_file(p)) {
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => error!("Autosave watch error: {e}"),
            },
            Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching autosaves at {}", dir.display());

        let task = tokio::spawn(forward_replays(rx, signals));
        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for AutosaveWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn is_replay_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(".replay.gbx"))
}

async fn forward_replays(
    mut paths: mpsc::UnboundedReceiver<PathBuf>,
    signals: mpsc::Sender<SessionSignal>,
) {
    let mut seen: HashMap<PathBuf, (u64, SystemTime)> = HashMap::new();

    while let Some(first) = paths.recv().await {
        tokio::time::sleep(SETTLE_DELAY).await;

        // Collapse the burst of events a single write produces
        let mut batch = BTreeSet::from([first]);
        while let Ok(path) = paths.try_recv() {
            batch.insert(path);
        }

        for path in batch {
            let Ok(meta) = tokio::fs::metadata(&path).await else {
                continue;
            };
            let stamp = (meta.len(), meta.modified().unwrap_or(SystemTime::UNIX_EPOCH));
            if seen.get(&path) == Some(&stamp) {
                continue;
            }

            let Some(signal) = read_signal(&path).await else {
                continue;
            };
            seen.insert(path, stamp);
            if signals.send(signal).await.is_err() {
                debug!("Session signal queue closed, stopping autosave forwarding");
                return;
            }
        }
    }
}

async fn read_signal(path: &Path) -> Option<SessionSignal> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read replay {}: {e}", path.display());
            return None;
        }
    };
    match read_replay_header(&bytes) {
        Ok(header) => Some(SessionSignal::ReplayDetected {
            path: path.to_path_buf(),
            header,
        }),
        Err(e) => {
            debug!("Skipping unreadable replay {}: {e}", path.display());
            None
        }
    }
}
