//! Bounded exponential backoff for map downloads

use super::{FetchError, MapArtifact, MapFetcher};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Retry configuration for transient fetch failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Spread delays by up to +/- half of this fraction
    #[serde(default)]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter_factor: 0.0,
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(8)
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling each time
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let multiplier = 2f64.powi(retry.saturating_sub(1).min(16) as i32);
        let delay = Duration::from_secs_f64(self.initial_delay.as_secs_f64() * multiplier);
        delay.min(self.max_delay)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        let range = delay.as_secs_f64() * self.jitter_factor;
        let jitter = rand::rng().random_range(-range / 2.0..=range / 2.0);
        Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
    }
}

/// Fetch a map, retrying transient failures with backoff
///
/// Permanent failures return immediately. After the last attempt the final
/// transient error is returned.
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<MapArtifact, FetchError>
where
    F: MapFetcher + ?Sized,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match fetcher.fetch(url).await {
            Ok(artifact) => return Ok(artifact),
            Err(err) if err.is_transient() && attempt < attempts => {
                let delay = policy.apply_jitter(policy.calculate_delay(attempt));
                warn!(
                    "Transient fetch failure ({err}), retrying in {delay:?} (attempt {attempt}/{attempts})"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(attempt, "Giving up on {url}: {err}");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedFetcher {
        script: Mutex<Vec<Result<MapArtifact, FetchError>>>,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(mut script: Vec<Result<MapArtifact, FetchError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MapFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &Url) -> Result<MapArtifact, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(FetchError::Permanent("script exhausted".into())))
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter_factor: 0.0,
        }
    }

    fn url() -> Url {
        Url::parse("https://tmuf.exchange/trackrandom").unwrap()
    }

    #[test]
    fn test_delay_doubles_up_to_max() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            ..Default::default()
        };
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(350));
        assert_eq!(policy.calculate_delay(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Transient("HTTP 503".into())),
            Ok(MapArtifact::new("1.Challenge.Gbx", b"GBX".to_vec())),
        ]);
        let artifact = fetch_with_retry(&fetcher, &url(), &fast_policy(3))
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "1.Challenge.Gbx");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::Permanent("HTTP 404".into()))]);
        let err = fetch_with_retry(&fetcher, &url(), &fast_policy(5))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Transient("timeout".into())),
            Err(FetchError::Transient("timeout".into())),
            Err(FetchError::Transient("timeout".into())),
        ]);
        let err = fetch_with_retry(&fetcher, &url(), &fast_policy(2))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
