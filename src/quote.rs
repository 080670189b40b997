//! Quote of the post, the decorative last line of every comment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::constants::HTTP_TIMEOUT_SECS;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("quote service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("quote service returned an empty quote")]
    Empty,
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn random_quote(&self) -> Result<String, QuoteError>;
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    quote: String,
}

/// Fetches one-line quotes from an iheartquotes-style JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    client: Client,
    url: String,
}

impl HttpQuoteSource {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn random_quote(&self) -> Result<String, QuoteError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("max_lines", "1"), ("format", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QuoteError::Status(response.status()));
        }

        let body: QuoteResponse = response.json().await?;
        let quote = body.quote.trim();
        if quote.is_empty() {
            return Err(QuoteError::Empty);
        }
        Ok(quote.to_string())
    }
}
