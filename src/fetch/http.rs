use super::{FetchError, MapArtifact, MapFetcher};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fetches maps from the exchange over HTTPS
///
/// The random endpoint redirects to the picked track's page
/// (`/trackshow/<id>`); the id is taken from the final URL and the map file
/// is then downloaded from `/trackgbx/<id>` on the same host.
pub struct HttpMapFetcher {
    client: Client,
}

impl HttpMapFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Permanent(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if is_transient_status(status) {
            Err(FetchError::Transient(format!("HTTP {status}")))
        } else {
            Err(FetchError::Permanent(format!("HTTP {status}")))
        }
    }
}

#[async_trait]
impl MapFetcher for HttpMapFetcher {
    async fn fetch(&self, url: &Url) -> Result<MapArtifact, FetchError> {
        let landing = self.get(url.clone()).await?;
        let track_url = landing.url().clone();
        let track_id = track_id_from_url(&track_url).ok_or_else(|| {
            FetchError::Permanent(format!("No track id in redirect target {track_url}"))
        })?;
        debug!(track_id, "Random track resolved");

        let download_url = track_url
            .join(&format!("/trackgbx/{track_id}"))
            .map_err(|e| FetchError::Permanent(e.to_string()))?;
        let response = self.get(download_url).await?;

        let file_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(file_name_from_disposition)
            .unwrap_or_else(|| format!("{track_id}.Challenge.Gbx"));

        let bytes = response.bytes().await.map_err(classify)?;
        Ok(MapArtifact::new(file_name, bytes.to_vec()).with_track_id(track_id))
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        FetchError::Transient(err.to_string())
    } else {
        FetchError::Permanent(err.to_string())
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Last numeric path segment, e.g. `/trackshow/123456`
fn track_id_from_url(url: &Url) -> Option<u64> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()
        .and_then(|s| s.parse().ok())
}

fn file_name_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_from_redirect_target() {
        let url = Url::parse("https://tmuf.exchange/trackshow/8642").unwrap();
        assert_eq!(track_id_from_url(&url), Some(8642));
        let url = Url::parse("https://tmuf.exchange/trackshow/8642/").unwrap();
        assert_eq!(track_id_from_url(&url), Some(8642));
        let url = Url::parse("https://tmuf.exchange/trackrandom").unwrap();
        assert_eq!(track_id_from_url(&url), None);
    }

    #[test]
    fn test_file_name_from_disposition() {
        assert_eq!(
            file_name_from_disposition("attachment; filename=\"A01-Race.Challenge.Gbx\""),
            Some("A01-Race.Challenge.Gbx".to_string())
        );
        assert_eq!(file_name_from_disposition("inline"), None);
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
    }
}
