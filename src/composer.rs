//! Builds the Markdown comment posted under each new post.

use crate::stats::PostStats;

/// Label of the quote line at the bottom of the comment.
pub const QUOTE_LABEL: &str = "^QOTPost:";

/// Prefix every word with `^` so Reddit renders it as superscript.
///
/// Line breaks are kept; whitespace within a line collapses to one space.
#[must_use]
pub fn superscript(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split_whitespace()
                .map(|word| format!("^{word}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Render the comment: statistics, a rule, the footer and the optional quote.
#[must_use]
pub fn compose_comment(stats: &PostStats, footer: &str, quote: Option<&str>) -> String {
    let mut comment = format!("{stats}\n---\n{}", superscript(footer));
    if let Some(quote) = quote {
        comment.push_str(&format!("\n\n{QUOTE_LABEL} *{}*", superscript(quote)));
    }
    comment
}
