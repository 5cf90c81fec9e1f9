//! Mock map fetcher for testing

use crate::fetch::{FetchError, MapArtifact, MapFetcher};
use crate::testing::gbx::MapFixture;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Serves scripted responses, then generated maps `map-1`, `map-2`, ...
///
/// Generated maps are Stadium maps with a 30s author time and a 33s gold
/// time. Every requested URL is recorded.
#[derive(Clone, Default)]
pub struct MockMapFetcher {
    scripted: Arc<Mutex<VecDeque<Result<MapArtifact, FetchError>>>>,
    requests: Arc<Mutex<Vec<Url>>>,
    generated: Arc<Mutex<u64>>,
    delay: Option<Duration>,
    always_fail: bool,
}

impl MockMapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch fails permanently
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Sleep before answering each fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a map built from a fixture
    pub fn push_map(&self, fixture: MapFixture) -> &Self {
        let artifact = MapArtifact::new("scripted.Challenge.Gbx", fixture.to_bytes());
        self.push(Ok(artifact))
    }

    /// Queue an arbitrary response
    pub fn push(&self, response: Result<MapArtifact, FetchError>) -> &Self {
        self.scripted.lock().unwrap().push_back(response);
        self
    }

    /// URLs fetched so far
    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn generate(&self) -> MapArtifact {
        let mut generated = self.generated.lock().unwrap();
        *generated += 1;
        let id = *generated;
        let fixture = MapFixture::new(&format!("map-{id}"), &format!("Generated {id}"));
        MapArtifact::new(format!("{id}.Challenge.Gbx"), fixture.to_bytes()).with_track_id(id)
    }
}

#[async_trait]
impl MapFetcher for MockMapFetcher {
    async fn fetch(&self, url: &Url) -> Result<MapArtifact, FetchError> {
        self.requests.lock().unwrap().push(url.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.always_fail {
            return Err(FetchError::Permanent("mock failure".to_string()));
        }
        let scripted = self.scripted.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(self.generate()),
        }
    }
}
