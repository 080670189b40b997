use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::models::{
    CommentData, CommentResponse, Listing, MessageData, SubmissionData, TokenResponse,
};
use super::{DiscussionPlatform, InboxMessage, PlatformError, Submission};
use crate::config::Config;
use crate::constants::HTTP_TIMEOUT_SECS;

/// Refresh the token this long before Reddit says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Reddit API client authenticating as a script app (password grant).
#[derive(Debug)]
pub struct RedditClient {
    client: Client,
    api_url: String,
    auth_url: String,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    /// Create a client from the bot configuration. No request is made yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth_url: config.auth_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: Mutex::new(None),
        })
    }

    /// Return a valid bearer token, logging in again when needed.
    async fn token(&self) -> Result<String, PlatformError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        debug!(username = %self.username, "Requesting access token");
        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|source| http_error(&self.auth_url, source))?;

        if !response.status().is_success() {
            return Err(PlatformError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|source| http_error(&self.auth_url, source))?;

        let value = match (body.access_token, body.error) {
            (Some(value), None) => value,
            (_, Some(error)) => return Err(PlatformError::Auth(error)),
            (None, None) => return Err(PlatformError::Auth("no access token".to_string())),
        };
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));

        info!(username = %self.username, "Logged in");
        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(value)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Send an authenticated request and check its status.
    ///
    /// A 401 drops the cached token so the next call logs in again.
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, PlatformError> {
        let token = self.token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| http_error(endpoint, source))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => {
                warn!(endpoint = %endpoint, "Access token rejected, will log in again");
                *self.token.lock().await = None;
                Err(PlatformError::Auth(format!("{endpoint} returned 401")))
            }
            status => Err(PlatformError::Status {
                endpoint: endpoint.to_string(),
                status,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let request = self.client.get(self.url(path)).query(query);
        let response = self.send(path, request).await?;
        response
            .json()
            .await
            .map_err(|source| http_error(path, source))
    }
}

fn http_error(endpoint: &str, source: reqwest::Error) -> PlatformError {
    PlatformError::Http {
        endpoint: endpoint.to_string(),
        source,
    }
}

#[async_trait]
impl DiscussionPlatform for RedditClient {
    async fn unread_messages(&self) -> Result<Vec<InboxMessage>, PlatformError> {
        let listing: Listing<MessageData> = self
            .get_json("/message/unread", &[("limit", "100"), ("raw_json", "1")])
            .await?;

        // The listing is newest first; forward in the order they arrived.
        let messages: Vec<InboxMessage> = listing
            .data
            .children
            .into_iter()
            .rev()
            .map(|thing| InboxMessage {
                fullname: thing.data.name,
                author: thing.data.author,
                subject: thing.data.subject,
                body: thing.data.body,
            })
            .collect();

        debug!(count = messages.len(), "Fetched unread messages");
        Ok(messages)
    }

    async fn mark_read(&self, message: &InboxMessage) -> Result<(), PlatformError> {
        let endpoint = "/api/read_message";
        let request = self
            .client
            .post(self.url(endpoint))
            .form(&[("id", message.fullname.as_str())]);
        self.send(endpoint, request).await?;
        Ok(())
    }

    async fn submission(&self, id: &str) -> Result<Submission, PlatformError> {
        let path = format!("/comments/{id}");
        let (post, comments): (Listing<SubmissionData>, Listing<CommentData>) = self
            .get_json(&path, &[("depth", "1"), ("limit", "500")])
            .await?;

        let data = post
            .data
            .children
            .into_iter()
            .find(|thing| thing.kind == "t3")
            .map(|thing| thing.data)
            .ok_or_else(|| PlatformError::NotFound(id.to_string()))?;

        let commenters = comments
            .data
            .children
            .into_iter()
            .filter(|thing| thing.kind == "t1")
            .filter_map(|thing| thing.data.author)
            .collect();

        Ok(Submission {
            id: data.id,
            fullname: data.name,
            title: data.title,
            commenters,
        })
    }

    async fn add_comment(
        &self,
        submission: &Submission,
        text: &str,
    ) -> Result<String, PlatformError> {
        let endpoint = "/api/comment";
        let request = self.client.post(self.url(endpoint)).form(&[
            ("api_type", "json"),
            ("thing_id", submission.fullname.as_str()),
            ("text", text),
        ]);
        let response: CommentResponse = self
            .send(endpoint, request)
            .await?
            .json()
            .await
            .map_err(|source| http_error(endpoint, source))?;

        if let Some(error) = response.json.errors.first() {
            let message = error
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join(": ");
            return Err(PlatformError::Api(message));
        }

        response
            .json
            .data
            .and_then(|data| data.things.into_iter().next())
            .map(|thing| thing.data.name)
            .ok_or_else(|| PlatformError::Api("comment response carried no comment".to_string()))
    }
}
