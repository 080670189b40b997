//! Failure containment for the externally facing steps of a cycle.

use std::fmt;
use std::future::Future;

use tracing::{error, warn};

/// A step of the polling cycle that talks to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FetchMessages,
    Extract,
    LookupSubmission,
    FetchQuote,
    Publish,
}

impl Step {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchMessages => "fetch_messages",
            Self::Extract => "extract",
            Self::LookupSubmission => "lookup_submission",
            Self::FetchQuote => "fetch_quote",
            Self::Publish => "publish",
        }
    }

    /// Whether a failure means a post goes uncommented for now.
    fn blocks_publish(self) -> bool {
        matches!(self, Self::LookupSubmission | Self::Publish)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `fut`; on failure log it against `step` and yield `None`.
///
/// Every remote failure in a cycle goes through here so it degrades to
/// "retry next cycle" instead of ending the loop.
pub async fn attempt<T, E, F>(step: Step, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) if step.blocks_publish() => {
            error!(step = %step, error = %e, "Step failed, post will be retried");
            None
        }
        Err(e) => {
            warn!(step = %step, error = %e, "Step failed, continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attempt_passes_value_through() {
        let value = attempt(Step::Extract, async { Ok::<_, String>(7) }).await;
        assert_eq!(value, Some(7));
    }

    #[tokio::test]
    async fn test_attempt_swallows_error() {
        let value: Option<u32> =
            attempt(Step::Publish, async { Err("remote said no".to_string()) }).await;
        assert_eq!(value, None);
    }
}
