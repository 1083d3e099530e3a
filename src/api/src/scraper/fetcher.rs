//! HTTP page fetcher for pre-race information pages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CACHE_CONTROL};
use std::time::Duration;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::types::RaceId;

/// Raw page as returned by upstream
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub id: RaceId,
    /// Canonical URL the page was requested from
    pub url: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Source of pre-race pages.
///
/// One call is one GET; implementations never retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Canonical URL for a race
    fn url_for(&self, id: &RaceId) -> String;

    /// Fetch the page for a race
    async fn fetch(&self, id: &RaceId) -> Result<FetchedPage, FetchError>;
}

/// `reqwest` backed fetcher with a bounded timeout
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en;q=0.8"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn url_for(&self, id: &RaceId) -> String {
        super::beforeinfo_url(&self.base_url, id)
    }

    async fn fetch(&self, id: &RaceId) -> Result<FetchedPage, FetchError> {
        let url = self.url_for(id);
        debug!("Fetching {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| classify(&url, e))?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody { url });
        }

        debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(FetchedPage {
            id: *id,
            url,
            body,
            fetched_at: Utc::now(),
        })
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
