//! Map download collaborator
//!
//! The orchestrator only sees the [`MapFetcher`] trait; [`HttpMapFetcher`]
//! is the real implementation against the exchange.

mod http;
pub mod retry;

pub use http::HttpMapFetcher;
pub use retry::{fetch_with_retry, RetryPolicy};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Network hiccup, timeout, 5xx or rate limiting; worth retrying
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// The map cannot be obtained from this URL
    #[error("Map could not be fetched: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// A downloaded map file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapArtifact {
    /// File name the map should be saved under
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Exchange track id, when the server revealed it
    pub track_id: Option<u64>,
}

impl MapArtifact {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            track_id: None,
        }
    }

    pub fn with_track_id(mut self, track_id: u64) -> Self {
        self.track_id = Some(track_id);
        self
    }
}

/// Resolves a request URL to a downloadable map
#[async_trait]
pub trait MapFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<MapArtifact, FetchError>;
}
