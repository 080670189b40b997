//! Statistics about the most recent A858 post.
//!
//! The auto-analysis page publishes, for each post, a block of annotations
//! (length, byte distribution, delay, MIME guess, time zone). This module
//! turns the block for the newest post into a [`PostStats`] record and
//! renders it as the Markdown body of the bot's comment.

mod extractor;
mod source;

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime};

pub use extractor::{extract_post_stats, ExtractionError, TITLE_TIMESTAMP_FORMAT};
pub use source::{fetch_latest, DocumentSource, FetchError, HttpDocumentSource, StatsError};

/// Label preceding the time zone link on the analysis page.
pub const TIMEZONE_LABEL: &str = "Identified time zone:";

/// Everything the analysis page reports about one post.
///
/// Raw annotation lines are kept verbatim next to the values parsed out of
/// them, so the rendered comment matches the page exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostStats {
    /// Reddit base36 id of the post.
    pub id: String,
    /// `Length: N bytes (= a + b * c)` as it appears on the page.
    pub length: String,
    pub byte_length: u64,
    /// The `a + b * c` part of the length annotation.
    pub length_factorization: String,
    /// `Statistical distribution: ...` line.
    pub distribution: String,
    /// Compact `YYYYMMDDhhmm` timestamp used as the post title.
    pub title: String,
    /// Title timestamp interpreted in the identified time zone.
    pub posted_at: DateTime<FixedOffset>,
    /// `Posted to Reddit: ...` line.
    pub posted: String,
    /// Timestamp part of the posted line, not required to agree with the title.
    pub posted_timestamp: String,
    /// `Post delay: N seconds` line.
    pub delay: String,
    pub delay_seconds: u64,
    /// `File type (MIME): ...` line.
    pub mime: String,
    pub mime_type: String,
    pub timezone: TimeZone,
}

/// The time zone guessed by the analysis page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeZone {
    /// Link text, e.g. `UTC+2`.
    pub label: String,
    /// Link target explaining the zone.
    pub link: String,
    /// Offset in hours from UTC.
    pub offset_hours: i32,
}

impl PostStats {
    /// The title timestamp without zone information.
    #[must_use]
    pub fn title_time(&self) -> NaiveDateTime {
        self.posted_at.naive_local()
    }

    /// Title timestamp in long form, e.g. `Sat Mar  1 13:37:00 2014`.
    #[must_use]
    pub fn title_time_display(&self) -> String {
        self.title_time().format("%a %b %e %H:%M:%S %Y").to_string()
    }
}

impl fmt::Display for PostStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{length}\n\n\
             {distribution}\n\n\
             Time in post title: {time}\n\n\
             {posted}\n\n\
             [{label} {tz}]({link})\n\n\
             {delay}\n\n\
             {mime}\n",
            length = self.length,
            distribution = self.distribution,
            time = self.title_time_display(),
            posted = self.posted,
            label = TIMEZONE_LABEL,
            tz = self.timezone.label,
            link = self.timezone.link,
            delay = self.delay,
            mime = self.mime,
        )
    }
}
