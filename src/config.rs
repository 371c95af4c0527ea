//! Configuration — read once from the environment at startup.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::outbound::ChatRef;

/// Default per-user pending-submission limit.
const DEFAULT_PENDING_LIMIT: i64 = 3;
/// Default media-group debounce window in milliseconds.
const DEFAULT_GROUP_WINDOW_MS: u64 = 1000;
/// Default delay before the supervisor restarts a crashed update loop.
const DEFAULT_RESTART_DELAY_SECS: u64 = 5;
/// Default submission categories (slug list).
const DEFAULT_CATEGORIES: &str = "joke,meme,story,news";

/// Bot configuration. Fixed at startup, not reloadable.
#[derive(Clone)]
pub struct Config {
    /// Bot API token.
    pub bot_token: SecretString,
    /// Moderation surface — the chat reviewers see submissions in.
    pub review_chat: ChatRef,
    /// Public destination — the channel approved posts go to.
    pub channel: ChatRef,
    /// Maximum number of a user's posts simultaneously pending.
    pub pending_limit: i64,
    /// Debounce window for media-group coalescing.
    pub group_window: Duration,
    /// Supervisor restart delay after an update-loop crash.
    pub restart_delay: Duration,
    /// Path to the libSQL database file.
    pub db_path: String,
    /// Port for the keep-alive health endpoint.
    pub health_port: u16,
    /// Allowed submission categories (slugs, doubling as hashtags).
    pub categories: Vec<String>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Fails fast on anything missing or malformed — the process must not
    /// start accepting updates with a broken destination.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = require("CURATOR_BOT_TOKEN")?;
        let review_chat = parse_chat("CURATOR_REVIEW_CHAT", &require("CURATOR_REVIEW_CHAT")?)?;
        let channel = parse_chat("CURATOR_CHANNEL", &require("CURATOR_CHANNEL")?)?;

        let pending_limit = parse_or("CURATOR_PENDING_LIMIT", DEFAULT_PENDING_LIMIT)?;
        if pending_limit < 1 {
            return Err(ConfigError::InvalidValue {
                key: "CURATOR_PENDING_LIMIT".into(),
                message: format!("must be at least 1, got {pending_limit}"),
            });
        }

        let group_window_ms: u64 = parse_or("CURATOR_GROUP_WINDOW_MS", DEFAULT_GROUP_WINDOW_MS)?;
        let restart_delay_secs: u64 =
            parse_or("CURATOR_RESTART_DELAY_SECS", DEFAULT_RESTART_DELAY_SECS)?;
        let health_port: u16 = parse_or("CURATOR_HEALTH_PORT", 8080)?;

        let db_path =
            std::env::var("CURATOR_DB_PATH").unwrap_or_else(|_| "./data/curator.db".to_string());

        let categories: Vec<String> = std::env::var("CURATOR_CATEGORIES")
            .unwrap_or_else(|_| DEFAULT_CATEGORIES.to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if categories.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "CURATOR_CATEGORIES".into(),
                message: "at least one category is required".into(),
            });
        }

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            review_chat,
            channel,
            pending_limit,
            group_window: Duration::from_millis(group_window_ms),
            restart_delay: Duration::from_secs(restart_delay_secs),
            db_path,
            health_port,
            categories,
        })
    }

    /// Check whether a category slug is one of the configured categories.
    pub fn is_known_category(&self, slug: &str) -> bool {
        self.categories.iter().any(|c| c == slug)
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse {v:?}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Validate a destination identifier: a numeric chat id or an `@name`.
fn parse_chat(key: &str, raw: &str) -> Result<ChatRef, ConfigError> {
    let valid = raw.parse::<i64>().is_ok() || (raw.starts_with('@') && raw.len() > 1);
    if valid {
        Ok(ChatRef::new(raw))
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a numeric chat id or @name, got {raw:?}"),
        })
    }
}
