//! The discussion platform the bot comments on and receives PMs from.

mod client;
mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use client::RedditClient;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("submission {0} not found")]
    NotFound(String),
    #[error("API rejected the request: {0}")]
    Api(String),
}

/// An unread item in the bot's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxMessage {
    /// Fullname (`t4_...` for PMs, `t1_...` for comment replies).
    pub fullname: String,
    /// `None` when the sender account has been deleted.
    pub author: Option<String>,
    pub subject: String,
    pub body: String,
}

impl InboxMessage {
    /// Sender name for display, `[deleted]` when unknown.
    #[must_use]
    pub fn author_name(&self) -> &str {
        self.author.as_deref().unwrap_or("[deleted]")
    }
}

/// A submission the bot may comment on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Base36 id, the same id the analysis page reports.
    pub id: String,
    /// Fullname (`t3_...`) used as comment parent.
    pub fullname: String,
    pub title: String,
    /// Authors of the top-level comments.
    pub commenters: Vec<String>,
}

impl Submission {
    /// Whether `username` already left a top-level comment (case-insensitive).
    #[must_use]
    pub fn has_comment_from(&self, username: &str) -> bool {
        self.commenters
            .iter()
            .any(|author| author.eq_ignore_ascii_case(username))
    }
}

/// Operations the bot needs from the discussion platform.
#[async_trait]
pub trait DiscussionPlatform: Send + Sync {
    /// Unread PMs and replies, oldest first.
    async fn unread_messages(&self) -> Result<Vec<InboxMessage>, PlatformError>;

    async fn mark_read(&self, message: &InboxMessage) -> Result<(), PlatformError>;

    /// Look up a submission by its base36 id.
    async fn submission(&self, id: &str) -> Result<Submission, PlatformError>;

    /// Post `text` as a top-level comment and return the new comment's fullname.
    async fn add_comment(&self, submission: &Submission, text: &str)
        -> Result<String, PlatformError>;
}
