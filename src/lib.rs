//! # TMX Randomizer
//!
//! Timed random-map challenge sessions against the track exchange sites.
//!
//! ## Usage
//!
//! ```bash
//! tmx-randomizer run [--preset "name"]
//! tmx-randomizer url [--seed 42] [--count 5]
//! ```
//!
//! ## Modules
//!
//! - `rules` - Rule set, exchange sites and the ordered field table
//! - `request` - Random map request URLs built from the rules
//! - `fetch` - Map download with bounded retries
//! - `gbx` - Minimal GBX header reader for maps and replays
//! - `validate` - Post-download map checks
//! - `session` - Session state machine, orchestrator task and manager
//! - `autosave` - Replay autosave watching and attribution
//! - `storage` - Session persistence and history
//! - `presets` - Saved rule sets
//! - `config` - Configuration file and directory layout
//! - `error` - Unified error type with numeric codes
//! - `testing` - Fixtures and mocks for tests
pub mod autosave;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gbx;
pub mod presets;
pub mod request;
pub mod rules;
pub mod session;
pub mod storage;
pub mod validate;

pub mod testing;
