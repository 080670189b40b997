//! SMTP relay used to forward private messages by email.
//!
//! Each mail opens its own session: connect, optional STARTTLS, optional
//! login, send, quit. The session is closed even when a step fails.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::MailConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);
const AUTH_MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to connect to {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: lettre::transport::smtp::Error,
    },
    #[error("STARTTLS negotiation failed: {0}")]
    Tls(#[source] lettre::transport::smtp::Error),
    #[error("SMTP authentication failed: {0}")]
    Authentication(#[source] lettre::transport::smtp::Error),
    #[error("server rejected the message: {0}")]
    Send(#[source] lettre::transport::smtp::Error),
    #[error("cannot build message: {0}")]
    InvalidMessage(String),
    #[error("mail task did not complete: {0}")]
    Aborted(String),
}

/// A plain-text mail ready to be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Send-only mail channel.
#[async_trait]
pub trait MailRelay: Send + Sync {
    /// Relay one mail. Every call is a complete, self-contained session.
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Relays mail through the configured SMTP server.
#[derive(Debug, Clone)]
pub struct SmtpRelay {
    config: MailConfig,
}

impl SmtpRelay {
    #[must_use]
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailRelay for SmtpRelay {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let config = self.config.clone();
        let mail = mail.clone();
        // lettre's connection API is blocking; keep it off the async workers.
        tokio::task::spawn_blocking(move || send_blocking(&config, &mail))
            .await
            .map_err(|e| MailError::Aborted(e.to_string()))?
    }
}

/// An open SMTP connection that says QUIT when dropped.
struct Session {
    conn: SmtpConnection,
}

impl Session {
    fn connect(config: &MailConfig, hello: &ClientId) -> Result<Self, MailError> {
        let conn = SmtpConnection::connect(
            (config.host.as_str(), config.port),
            Some(SMTP_TIMEOUT),
            hello,
            None,
            None,
        )
        .map_err(|source| MailError::Connection {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;
        Ok(Self { conn })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.conn.quit() {
            debug!(error = %e, "SMTP QUIT failed, closing connection");
            self.conn.abort();
        }
    }
}

fn send_blocking(config: &MailConfig, mail: &OutgoingMail) -> Result<(), MailError> {
    let message = build_message(mail)?;
    let hello = ClientId::Domain("localhost".to_string());

    let mut session = Session::connect(config, &hello)?;

    if config.starttls {
        let tls = TlsParameters::new(config.host.clone()).map_err(MailError::Tls)?;
        session
            .conn
            .starttls(&tls, &hello)
            .map_err(MailError::Tls)?;
    }

    if let Some(credentials) = &config.credentials {
        let credentials =
            Credentials::new(credentials.username.clone(), credentials.password.clone());
        session
            .conn
            .auth(AUTH_MECHANISMS, &credentials)
            .map_err(MailError::Authentication)?;
    }

    session
        .conn
        .send(message.envelope(), &message.formatted())
        .map_err(MailError::Send)?;

    info!(to = %mail.to, subject = %mail.subject, "Mail relayed");
    Ok(())
}

fn build_message(mail: &OutgoingMail) -> Result<Message, MailError> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| MailError::InvalidMessage(format!("invalid from address: {e}")))?;
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|e| MailError::InvalidMessage(format!("invalid to address: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|e| MailError::InvalidMessage(e.to_string()))
}
