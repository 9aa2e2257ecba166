use anyhow::{bail, Result};
use std::time::Duration;

use crate::util::{env_flag, env_string, unix_millis};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";
pub const DEFAULT_LOCALE: &str = "zh";

/// What a reducer does with an event that references an identifier the stream
/// never introduced, or that arrives out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViolationPolicy {
    /// Log and drop the event; the rest of the stream still renders.
    #[default]
    Ignore,
    /// End the stream with an error outcome.
    Fail,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub locale: String,
    pub session_id: String,
    pub idle_timeout: Option<Duration>,
    pub violation_policy: ViolationPolicy,
    pub filler_filter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            session_id: format!("session-{}", unix_millis()),
            idle_timeout: None,
            violation_policy: ViolationPolicy::Ignore,
            filler_filter: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let idle_timeout = match env_string("LIVEDOC_IDLE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => bail!("Invalid LIVEDOC_IDLE_TIMEOUT_SECS '{raw}': expected seconds"),
            },
            None => None,
        };

        let violation_policy = if env_flag("LIVEDOC_STRICT_PROTOCOL", false) {
            ViolationPolicy::Fail
        } else {
            ViolationPolicy::Ignore
        };

        Ok(Self {
            base_url: env_string("LIVEDOC_BASE_URL").unwrap_or(defaults.base_url),
            locale: env_string("LIVEDOC_LOCALE").unwrap_or(defaults.locale),
            session_id: env_string("LIVEDOC_SESSION_ID").unwrap_or(defaults.session_id),
            idle_timeout,
            violation_policy,
            filler_filter: env_flag("LIVEDOC_FILLER_FILTER", defaults.filler_filter),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!(
                "Invalid LIVEDOC_BASE_URL '{}': expected http:// or https:// URL",
                self.base_url
            );
        }

        let locale_ok = !self.locale.is_empty()
            && self
                .locale
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !locale_ok {
            bail!(
                "Invalid LIVEDOC_LOCALE '{}': expected a tag like 'zh' or 'en-US'",
                self.locale
            );
        }

        if self.session_id.trim().is_empty() {
            bail!("LIVEDOC_SESSION_ID must not be blank");
        }

        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            bail!("LIVEDOC_IDLE_TIMEOUT_SECS must be greater than zero");
        }

        Ok(())
    }
}
