//! Relays private messages received by the bot account to its owner.

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::mailer::{MailRelay, OutgoingMail};
use crate::reddit::{DiscussionPlatform, InboxMessage};

/// What happened to a batch of inbox messages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ForwardReport {
    pub forwarded: usize,
    pub ignored: usize,
    /// Relay attempts that failed; those messages are still marked read.
    pub relay_failed: usize,
    /// Messages that could not be marked read and will show up again.
    pub mark_failed: usize,
}

/// Build the mail relaying `message`.
#[must_use]
pub fn forward_mail(config: &Config, message: &InboxMessage) -> OutgoingMail {
    OutgoingMail {
        from: config.mail.from.clone(),
        to: config.mail.to.clone(),
        subject: format!("PM from {}: {}", message.author_name(), message.subject),
        body: message.body.clone(),
    }
}

/// Forward every message to the configured mailbox, then mark it read.
///
/// Messages from ignored senders are marked read without being relayed.
/// A message is only marked read once its relay attempt has finished,
/// whatever the outcome. Failures never stop the rest of the batch.
pub async fn forward_messages(
    config: &Config,
    platform: &dyn DiscussionPlatform,
    relay: &dyn MailRelay,
    messages: &[InboxMessage],
) -> ForwardReport {
    let mut report = ForwardReport::default();

    for message in messages {
        let author = message.author_name();

        if message.author.as_deref().is_some_and(|a| config.is_ignored(a)) {
            debug!(author = %author, message = %message.fullname, "Ignoring message");
            report.ignored += 1;
        } else {
            match relay.send(&forward_mail(config, message)).await {
                Ok(()) => {
                    info!(author = %author, message = %message.fullname, "Forwarded message");
                    report.forwarded += 1;
                }
                Err(e) => {
                    warn!(
                        author = %author,
                        message = %message.fullname,
                        error = %e,
                        "Failed to forward message"
                    );
                    report.relay_failed += 1;
                }
            }
        }

        if let Err(e) = platform.mark_read(message).await {
            warn!(message = %message.fullname, error = %e, "Failed to mark message read");
            report.mark_failed += 1;
        }
    }

    report
}
