use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::{extract_post_stats, ExtractionError, PostStats};
use crate::constants::HTTP_TIMEOUT_SECS;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Failure to obtain the latest [`PostStats`].
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("failed to fetch analysis page: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to extract post statistics: {0}")]
    Extraction(#[from] ExtractionError),
}

/// Where the analysis page comes from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the current page markup.
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Fetches the analysis page with a plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    client: Client,
    url: String,
}

impl HttpDocumentSource {
    /// Create a source for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()?;
        Ok(Self::with_client(client, url))
    }

    #[must_use]
    pub fn with_client(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        debug!(url = %self.url, "Fetching analysis page");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: self.url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: response.status(),
            });
        }

        response.text().await.map_err(|source| FetchError::Http {
            url: self.url.clone(),
            source,
        })
    }
}

/// Fetch the page from `source` and extract the newest post.
///
/// # Errors
///
/// Returns an error if the page cannot be fetched or does not contain a
/// complete post block.
pub async fn fetch_latest(source: &dyn DocumentSource) -> Result<PostStats, StatsError> {
    let html = source.fetch().await?;
    Ok(extract_post_stats(&html)?)
}
