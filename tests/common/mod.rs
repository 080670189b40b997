//! In-memory stand-ins for the bot's external services.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use a858_stats_bot::bot::{Bot, BotContext, Services};
use a858_stats_bot::config::Config;
use a858_stats_bot::mailer::{MailError, MailRelay, OutgoingMail};
use a858_stats_bot::quote::{QuoteError, QuoteSource};
use a858_stats_bot::reddit::{DiscussionPlatform, InboxMessage, PlatformError, Submission};
use a858_stats_bot::stats::{DocumentSource, FetchError};
use tokio_util::sync::CancellationToken;

pub const PAGE: &str = include_str!("../fixtures/analysis_page.html");
pub const NEWEST_ID: &str = "1zbx5q";

/// Ordered record of every side effect, shared by all fakes.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Hands a fake to the bot while the test keeps a handle on it.
pub struct Shared<T>(pub Arc<T>);

impl<T> std::ops::Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

pub fn test_config(cache_path: &Path, extra: &str) -> Config {
    let rc = format!(
        "useragent test agent\n\
         username a858bot\n\
         password secret\n\
         client_id id\n\
         client_secret shh\n\
         smtp_server localhost\n\
         email_from bot@example.com\n\
         email_to owner@example.com\n\
         footer I am a bot.\n\
         delay 3600\n\
         cache_file {}\n\
         {extra}\n",
        cache_path.display()
    );
    Config::from_rc_str(&rc).expect("valid test config")
}

pub struct FakeSource {
    pub html: Mutex<Option<String>>,
}

impl FakeSource {
    pub fn serving(html: &str) -> Self {
        Self {
            html: Mutex::new(Some(html.to_string())),
        }
    }

    pub fn failing() -> Self {
        Self {
            html: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DocumentSource for Shared<FakeSource> {
    async fn fetch(&self) -> Result<String, FetchError> {
        self.html
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| FetchError::Status {
                url: "http://a858.test/".to_string(),
                status: reqwest::StatusCode::BAD_GATEWAY,
            })
    }
}

#[derive(Default)]
pub struct FakePlatform {
    pub log: EventLog,
    pub inbox: Mutex<Vec<InboxMessage>>,
    pub commenters: Mutex<Vec<String>>,
    pub fail_inbox: Mutex<bool>,
    pub fail_lookup: Mutex<bool>,
    /// Number of upcoming `add_comment` calls that fail.
    pub fail_publish: Mutex<usize>,
    pub comments: Mutex<Vec<(String, String)>>,
    pub marked: Mutex<Vec<String>>,
}

fn remote_error(endpoint: &str) -> PlatformError {
    PlatformError::Status {
        endpoint: endpoint.to_string(),
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[async_trait]
impl DiscussionPlatform for Shared<FakePlatform> {
    async fn unread_messages(&self) -> Result<Vec<InboxMessage>, PlatformError> {
        if *self.fail_inbox.lock().unwrap() {
            return Err(remote_error("/message/unread"));
        }
        Ok(self.inbox.lock().unwrap().drain(..).collect())
    }

    async fn mark_read(&self, message: &InboxMessage) -> Result<(), PlatformError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("mark:{}", message.fullname));
        self.marked.lock().unwrap().push(message.fullname.clone());
        Ok(())
    }

    async fn submission(&self, id: &str) -> Result<Submission, PlatformError> {
        if *self.fail_lookup.lock().unwrap() {
            return Err(remote_error("/comments"));
        }
        Ok(Submission {
            id: id.to_string(),
            fullname: format!("t3_{id}"),
            title: "201403011337".to_string(),
            commenters: self.commenters.lock().unwrap().clone(),
        })
    }

    async fn add_comment(
        &self,
        submission: &Submission,
        text: &str,
    ) -> Result<String, PlatformError> {
        {
            let mut remaining = self.fail_publish.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(remote_error("/api/comment"));
            }
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("comment:{}", submission.id));
        let mut comments = self.comments.lock().unwrap();
        comments.push((submission.fullname.clone(), text.to_string()));
        Ok(format!("t1_c{}", comments.len()))
    }
}

#[derive(Default)]
pub struct FakeRelay {
    pub log: EventLog,
    pub fail: Mutex<bool>,
    pub sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl MailRelay for Shared<FakeRelay> {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.log.lock().unwrap().push(format!("send:{}", mail.subject));
        self.sent.lock().unwrap().push(mail.clone());
        if *self.fail.lock().unwrap() {
            return Err(MailError::InvalidMessage("relay refused".to_string()));
        }
        Ok(())
    }
}

pub struct FakeQuotes {
    pub quote: Option<String>,
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn random_quote(&self) -> Result<String, QuoteError> {
        self.quote.clone().ok_or(QuoteError::Empty)
    }
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub platform: Arc<FakePlatform>,
    pub relay: Arc<FakeRelay>,
    pub log: EventLog,
}

impl Harness {
    pub fn new(source: FakeSource) -> Self {
        let log = EventLog::default();
        Self {
            source: Arc::new(source),
            platform: Arc::new(FakePlatform {
                log: log.clone(),
                ..FakePlatform::default()
            }),
            relay: Arc::new(FakeRelay {
                log: log.clone(),
                ..FakeRelay::default()
            }),
            log,
        }
    }

    pub fn bot(&self, config: Config, quote: Option<&str>) -> Bot {
        self.bot_with_stop(config, quote, CancellationToken::new())
    }

    pub fn bot_with_stop(
        &self,
        config: Config,
        quote: Option<&str>,
        stop: CancellationToken,
    ) -> Bot {
        let ctx = BotContext::open(config, stop).expect("cache opens");
        self.bot_from_context(ctx, quote)
    }

    pub fn bot_from_context(&self, ctx: BotContext, quote: Option<&str>) -> Bot {
        Bot::new(
            ctx,
            Services {
                source: Box::new(Shared(self.source.clone())),
                platform: Box::new(Shared(self.platform.clone())),
                relay: Box::new(Shared(self.relay.clone())),
                quotes: Box::new(FakeQuotes {
                    quote: quote.map(str::to_string),
                }),
            },
        )
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

pub fn message(fullname: &str, author: &str, subject: &str) -> InboxMessage {
    InboxMessage {
        fullname: fullname.to_string(),
        author: Some(author.to_string()),
        subject: subject.to_string(),
        body: format!("body of {fullname}"),
    }
}
