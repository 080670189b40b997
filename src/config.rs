use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_AUTH_URL, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_FILE,
    DEFAULT_QUOTE_URL, DEFAULT_SMTP_PORT, DEFAULT_STATS_URL,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing required config key: {0}")]
    MissingKey(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Bot configuration, loaded once from the rc file at startup.
#[derive(Clone)]
pub struct Config {
    // Reddit
    pub user_agent: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_url: String,
    pub auth_url: String,
    pub check_existing_comments: bool,

    // Source page
    pub stats_url: String,
    pub quote_url: String,
    pub poll_delay: Duration,
    pub footer: String,

    // Dedup cache
    pub cache_path: PathBuf,
    pub cache_capacity: usize,

    // PM forwarding
    pub mail: MailConfig,
    /// Lowercased usernames whose PMs are marked read without forwarding.
    pub ignore_from: Vec<String>,
}

/// SMTP relay settings used to forward private messages.
#[derive(Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub starttls: bool,
    pub credentials: Option<MailCredentials>,
    pub from: String,
    pub to: String,
}

#[derive(Clone)]
pub struct MailCredentials {
    pub username: String,
    pub password: String,
}

impl Config {
    /// Read and parse the rc file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a required key is
    /// missing, or a value cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_rc_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from rc file contents.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing or a value is invalid.
    pub fn from_rc_str(contents: &str) -> Result<Self, ConfigError> {
        let values = parse_rc(contents);
        Self::from_values(&values)
    }

    fn from_values(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let email_username = optional(values, "email_username");
        let credentials = match email_username {
            Some(username) => Some(MailCredentials {
                username,
                password: required(values, "email_password")?,
            }),
            None => None,
        };

        Ok(Self {
            // Reddit
            user_agent: required(values, "useragent")?,
            username: required(values, "username")?,
            password: required(values, "password")?,
            client_id: required(values, "client_id")?,
            client_secret: required(values, "client_secret")?,
            api_url: or_default(values, "api_url", DEFAULT_API_URL),
            auth_url: or_default(values, "auth_url", DEFAULT_AUTH_URL),
            check_existing_comments: parse_bool(values, "check_existing_comments", false)?,

            // Source page
            stats_url: or_default(values, "stats_url", DEFAULT_STATS_URL),
            quote_url: or_default(values, "quote_url", DEFAULT_QUOTE_URL),
            poll_delay: Duration::from_secs(parse_required_u64(values, "delay")?),
            footer: required(values, "footer")?,

            // Dedup cache
            cache_path: expand_path(&or_default(values, "cache_file", DEFAULT_CACHE_FILE)),
            cache_capacity: parse_usize(values, "cache_size", DEFAULT_CACHE_CAPACITY)?,

            // PM forwarding
            mail: MailConfig {
                host: required(values, "smtp_server")?,
                port: parse_u16(values, "smtp_port", DEFAULT_SMTP_PORT)?,
                starttls: parse_bool(values, "smtp_tls", false)?,
                credentials,
                from: required(values, "email_from")?,
                to: required(values, "email_to")?,
            },
            ignore_from: optional(values, "ignore_from")
                .map(|list| list.split_whitespace().map(str::to_lowercase).collect())
                .unwrap_or_default(),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "cache_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for (name, url) in [
            ("stats_url", &self.stats_url),
            ("api_url", &self.api_url),
            ("auth_url", &self.auth_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("expected an http(s) URL, got '{url}'"),
                });
            }
        }
        Ok(())
    }

    /// Whether PMs from `author` are dropped instead of forwarded.
    #[must_use]
    pub fn is_ignored(&self, author: &str) -> bool {
        let author = author.to_lowercase();
        self.ignore_from.iter().any(|ignored| *ignored == author)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user_agent", &self.user_agent)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("stats_url", &self.stats_url)
            .field("poll_delay", &self.poll_delay)
            .field("cache_path", &self.cache_path)
            .field("cache_capacity", &self.cache_capacity)
            .field("mail", &self.mail)
            .field("ignore_from", &self.ignore_from)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("starttls", &self.starttls)
            .field(
                "username",
                &self.credentials.as_ref().map(|c| c.username.as_str()),
            )
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

/// Split rc file contents into key/value pairs.
///
/// The first run of whitespace separates the key from the value; a key on
/// its own maps to an empty value. Blank lines and `#` comments are skipped.
#[must_use]
pub fn parse_rc(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(char::is_whitespace) {
            Some((key, value)) => (key.to_string(), value.trim().to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

/// Expand a leading `~` and `$VAR` / `${VAR}` references in a path.
#[must_use]
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_vars(raw);
    if expanded == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = expanded.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(expanded)
}

fn expand_vars(raw: &str) -> String {
    static VAR: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
        regex::Regex::new(r"\$(?:\{(\w+)\}|(\w+))").expect("valid regex")
    });
    VAR.replace_all(raw, |caps: &regex::Captures<'_>| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        // Unknown variables are left untouched.
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

fn required(values: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    optional(values, name).ok_or_else(|| ConfigError::MissingKey(name.to_string()))
}

fn optional(values: &HashMap<String, String>, name: &str) -> Option<String> {
    values.get(name).filter(|v| !v.is_empty()).cloned()
}

fn or_default(values: &HashMap<String, String>, name: &str, default: &str) -> String {
    optional(values, name).unwrap_or_else(|| default.to_string())
}

fn parse_required_u64(values: &HashMap<String, String>, name: &str) -> Result<u64, ConfigError> {
    required(values, name)?
        .parse()
        .map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        })
}

fn parse_u16(values: &HashMap<String, String>, name: &str, default: u16) -> Result<u16, ConfigError> {
    match optional(values, name) {
        Some(val) => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        None => Ok(default),
    }
}

fn parse_usize(
    values: &HashMap<String, String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match optional(values, name) {
        Some(val) => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        None => Ok(default),
    }
}

fn parse_bool(values: &HashMap<String, String>, name: &str, default: bool) -> Result<bool, ConfigError> {
    match optional(values, name) {
        Some(val) => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        None => Ok(default),
    }
}
