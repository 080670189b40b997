//! The polling loop tying extraction, dedup, publishing and PM forwarding
//! together.
//!
//! One cycle runs strictly in order:
//!
//! 1. fetch unread messages and forward them by mail,
//! 2. fetch the analysis page and extract the newest post,
//! 3. stop here if the post id is already in the dedup cache,
//! 4. look up the submission, compose and post the comment,
//! 5. record the id in the cache and save it.
//!
//! Remote failures are contained per step (see [`attempt`]); a corrupt or
//! unwritable cache is fatal.

mod step;

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use step::{attempt, Step};

use crate::cache::{CacheError, DedupCache};
use crate::composer::compose_comment;
use crate::config::Config;
use crate::forwarder::forward_messages;
use crate::mailer::MailRelay;
use crate::quote::QuoteSource;
use crate::reddit::DiscussionPlatform;
use crate::stats::{fetch_latest, DocumentSource};

/// Errors that end the bot loop.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// State shared by every step: configuration, the dedup cache and the stop
/// signal.
#[derive(Debug)]
pub struct BotContext {
    pub config: Config,
    pub cache: DedupCache,
    pub stop: CancellationToken,
}

impl BotContext {
    /// Open the dedup cache named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing cache file cannot be read or decoded.
    pub fn open(config: Config, stop: CancellationToken) -> Result<Self, BotError> {
        let cache = DedupCache::open(&config.cache_path, config.cache_capacity)?;
        info!(
            path = %cache.path().display(),
            entries = cache.len(),
            "Dedup cache ready"
        );
        Ok(Self {
            config,
            cache,
            stop,
        })
    }
}

/// The external services a cycle talks to.
pub struct Services {
    pub source: Box<dyn DocumentSource>,
    pub platform: Box<dyn DiscussionPlatform>,
    pub relay: Box<dyn MailRelay>,
    pub quotes: Box<dyn QuoteSource>,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A comment was posted and the id recorded.
    Published { post_id: String, comment: String },
    /// The bot had already commented; the id was recorded without posting.
    AlreadyCommented { post_id: String },
    /// The newest post is in the cache.
    AlreadySeen { post_id: String },
    /// A step failed; nothing was recorded.
    Skipped(Step),
}

impl CycleOutcome {
    /// How long to wait before the next cycle.
    #[must_use]
    pub fn pause(&self, delay: Duration) -> Option<Duration> {
        match self {
            Self::Published { .. } | Self::AlreadyCommented { .. } => None,
            Self::AlreadySeen { .. } | Self::Skipped(_) => Some(delay),
        }
    }
}

pub struct Bot {
    ctx: BotContext,
    services: Services,
}

impl Bot {
    #[must_use]
    pub fn new(ctx: BotContext, services: Services) -> Self {
        Self { ctx, services }
    }

    #[must_use]
    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    /// Run cycles until the stop token is cancelled.
    ///
    /// The token is only looked at between cycles and while sleeping, so a
    /// publish is always followed by its cache update.
    ///
    /// # Errors
    ///
    /// Returns an error if the dedup cache cannot be saved.
    pub async fn run(&mut self) -> Result<(), BotError> {
        info!(
            stats_url = %self.ctx.config.stats_url,
            delay_secs = self.ctx.config.poll_delay.as_secs(),
            "Bot loop started"
        );

        while !self.ctx.stop.is_cancelled() {
            let outcome = self.run_cycle().await?;
            debug!(?outcome, "Cycle finished");

            if let Some(pause) = outcome.pause(self.ctx.config.poll_delay) {
                tokio::select! {
                    () = self.ctx.stop.cancelled() => break,
                    () = tokio::time::sleep(pause) => {}
                }
            }
        }

        info!("Stop requested, bot loop finished");
        Ok(())
    }

    /// Run one full cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the dedup cache cannot be saved after publishing.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, BotError> {
        self.forward_pending().await;

        let Some(stats) = attempt(Step::Extract, fetch_latest(self.services.source.as_ref())).await
        else {
            return Ok(CycleOutcome::Skipped(Step::Extract));
        };
        let post_id = stats.id.clone();

        if self.ctx.cache.contains(&post_id) {
            debug!(post_id = %post_id, "Newest post already handled");
            return Ok(CycleOutcome::AlreadySeen { post_id });
        }

        info!(post_id = %post_id, bytes = stats.byte_length, "New post found");

        let platform = self.services.platform.as_ref();
        let Some(submission) = attempt(Step::LookupSubmission, platform.submission(&post_id)).await
        else {
            return Ok(CycleOutcome::Skipped(Step::LookupSubmission));
        };

        if self.ctx.config.check_existing_comments
            && submission.has_comment_from(&self.ctx.config.username)
        {
            info!(post_id = %post_id, "Already commented on this post, recording it");
            self.record(&post_id)?;
            return Ok(CycleOutcome::AlreadyCommented { post_id });
        }

        // A missing quote only drops the decoration.
        let quote = attempt(Step::FetchQuote, self.services.quotes.random_quote()).await;
        let comment = compose_comment(&stats, &self.ctx.config.footer, quote.as_deref());

        let Some(comment_id) =
            attempt(Step::Publish, platform.add_comment(&submission, &comment)).await
        else {
            return Ok(CycleOutcome::Skipped(Step::Publish));
        };

        info!(post_id = %post_id, comment = %comment_id, "Comment posted");
        self.record(&post_id)?;

        Ok(CycleOutcome::Published { post_id, comment })
    }

    async fn forward_pending(&self) {
        let platform = self.services.platform.as_ref();
        let messages = attempt(Step::FetchMessages, platform.unread_messages())
            .await
            .unwrap_or_default();
        if messages.is_empty() {
            return;
        }

        let report = forward_messages(
            &self.ctx.config,
            platform,
            self.services.relay.as_ref(),
            &messages,
        )
        .await;
        info!(
            forwarded = report.forwarded,
            ignored = report.ignored,
            relay_failed = report.relay_failed,
            mark_failed = report.mark_failed,
            "Inbox processed"
        );
    }

    fn record(&mut self, post_id: &str) -> Result<(), CacheError> {
        self.ctx.cache.add(post_id);
        self.ctx.cache.save()
    }
}
