//! Mock implementations for testing
//!
//! Stand-ins for the session's network and storage collaborators.

pub mod fetcher;
pub mod store;

pub use fetcher::MockMapFetcher;
pub use store::MockSessionStore;
