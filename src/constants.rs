//! Shared constants used across the application.

/// Page carrying the automatic analysis of the most recent A858 post.
pub const DEFAULT_STATS_URL: &str = "http://a858.soulsphere.org/";

/// Random quote endpoint used for the comment footer.
pub const DEFAULT_QUOTE_URL: &str = "http://www.iheartquotes.com/api/v1/random";

/// Base URL for authenticated Reddit API calls.
pub const DEFAULT_API_URL: &str = "https://oauth.reddit.com";

/// OAuth2 token endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";

pub const DEFAULT_RC_FILE: &str = "~/.a858rc";
pub const DEFAULT_CACHE_FILE: &str = "~/.a858cache";

/// Number of post ids remembered by the dedup cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Timeout applied to every outbound HTTP request.
pub const HTTP_TIMEOUT_SECS: u64 = 30;
