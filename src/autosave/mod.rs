//! Replay autosave handling
//!
//! The game drops a replay file into its autosave directory after each
//! finish. [`AutosaveWatcher`] turns those files into session signals and
//! [`AutosaveReconciler`] attributes the matching ones to the map in play.

pub mod naming;
mod reconciler;
mod watcher;

pub use naming::{replay_file_name, DEFAULT_REPLAY_FILE_FORMAT};
pub use reconciler::{medal_for, AutosaveReconciler, Reconciliation};
pub use watcher::{is_replay_file, AutosaveWatcher};
