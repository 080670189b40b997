use chrono::{FixedOffset, NaiveDateTime, TimeZone as _};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::{PostStats, TimeZone, TIMEZONE_LABEL};

/// Format of the compact timestamp used as post title.
pub const TITLE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

static POST_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^post-\w{6}$").expect("valid regex"));
static LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Length: (\d+) bytes \(= (\d+ \+ \d+ \* \d+)\))").expect("valid regex")
});
static DISTRIBUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Statistical distribution: (.+ \(.+ stddevs\)))").expect("valid regex")
});
static POSTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Posted to Reddit: (\w{3} \w{3} \s?\d{1,2} \d{2}:\d{2}:\d{2} \d{4} UTC))")
        .expect("valid regex")
});
static DELAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Post delay: (\d+) seconds)").expect("valid regex"));
static MIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(File type \(MIME\): ([^<]*))").expect("valid regex"));

static POST_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[id^='post-']").expect("valid selector"));
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").expect("valid selector"));
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid selector"));

/// Reasons the analysis page could not be turned into a [`PostStats`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no post block with an id like post-XXXXXX")]
    MissingPost,
    #[error("missing {0} annotation")]
    MissingField(&'static str),
    #[error("invalid {field} value: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("title {value:?} is not a YYYYMMDDhhmm timestamp: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("time zone label {label:?} does not carry a UTC offset")]
    InvalidTimezone { label: String },
}

/// Extract the statistics of the newest post from the analysis page.
///
/// The newest post is the first element whose id matches `post-XXXXXX`.
/// Every field must be present; a single missing or malformed annotation
/// fails the whole extraction.
///
/// # Errors
///
/// Returns an [`ExtractionError`] naming the first field that could not be
/// extracted.
pub fn extract_post_stats(html: &str) -> Result<PostStats, ExtractionError> {
    let document = Html::parse_document(html);
    let post = document
        .select(&POST_SELECTOR)
        .find(|el| el.value().id().is_some_and(|id| POST_ID.is_match(id)))
        .ok_or(ExtractionError::MissingPost)?;
    // Serialised HTML escapes text; captures are unescaped before use.
    let post_html = post.html();

    let length = captures(&LENGTH, &post_html, "length")?;
    let distribution = captures(&DISTRIBUTION, &post_html, "distribution")?;
    let posted = captures(&POSTED, &post_html, "posted")?;
    let delay = captures(&DELAY, &post_html, "delay")?;
    let mime = captures(&MIME, &post_html, "mimetype")?;

    let title = post
        .select(&TITLE_SELECTOR)
        .next()
        .map(|h3| h3.text().collect::<String>().trim().to_string())
        .ok_or(ExtractionError::MissingField("title"))?;
    let title_time = NaiveDateTime::parse_from_str(&title, TITLE_TIMESTAMP_FORMAT).map_err(
        |source| ExtractionError::InvalidTimestamp {
            value: title.clone(),
            source,
        },
    )?;

    let id = post
        .select(&ANCHOR_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("name"))
        .map(str::to_string)
        .ok_or(ExtractionError::MissingField("id"))?;

    let timezone = extract_timezone(post)?;
    let offset = timezone
        .offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ExtractionError::InvalidTimezone {
            label: timezone.label.clone(),
        })?;
    let posted_at = offset
        .from_local_datetime(&title_time)
        .single()
        .ok_or_else(|| ExtractionError::InvalidTimezone {
            label: timezone.label.clone(),
        })?;

    Ok(PostStats {
        id,
        length: unescape(&length[1]),
        byte_length: parse_number(&length[2], "length")?,
        length_factorization: unescape(&length[3]),
        distribution: unescape(&distribution[1]),
        title,
        posted_at,
        posted: unescape(&posted[1]),
        posted_timestamp: unescape(&posted[2]),
        delay: unescape(&delay[1]),
        delay_seconds: parse_number(&delay[2], "delay")?,
        mime: unescape(mime[1].trim_end()),
        mime_type: unescape(mime[2].trim()),
        timezone,
    })
}

fn captures<'h>(
    regex: &Regex,
    haystack: &'h str,
    field: &'static str,
) -> Result<Captures<'h>, ExtractionError> {
    regex
        .captures(haystack)
        .ok_or(ExtractionError::MissingField(field))
}

/// Undo the entity escaping applied when a node is serialised back to HTML.
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

fn parse_number(value: &str, field: &'static str) -> Result<u64, ExtractionError> {
    value.parse().map_err(|_| ExtractionError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Find the link following the time zone label and parse its offset.
fn extract_timezone(post: ElementRef<'_>) -> Result<TimeZone, ExtractionError> {
    let label_node = post
        .descendants()
        .find(|node| {
            node.value()
                .as_text()
                .is_some_and(|text| text.contains(TIMEZONE_LABEL))
        })
        .ok_or(ExtractionError::MissingField("timezone"))?;

    // The link is a sibling of the label text, or of its wrapping element.
    let post_node = *post;
    let link = std::iter::successors(Some(label_node), |node| node.parent())
        .take_while(|node| node.id() != post_node.id())
        .take(2)
        .find_map(|node| node.next_siblings().find_map(ElementRef::wrap))
        .ok_or(ExtractionError::MissingField("timezone"))?;

    let label = link.text().collect::<String>().trim().to_string();
    let href = link
        .value()
        .attr("href")
        .ok_or(ExtractionError::MissingField("timezone link"))?;

    // Labels look like "UTC+2": the offset follows a fixed three-letter prefix.
    let offset_hours = label
        .chars()
        .skip(3)
        .collect::<String>()
        .trim()
        .parse::<i32>()
        .map_err(|_| ExtractionError::InvalidTimezone {
            label: label.clone(),
        })?;

    Ok(TimeZone {
        label,
        link: href.to_string(),
        offset_hours,
    })
}
