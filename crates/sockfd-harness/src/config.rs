//! Harness configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, the
//! environment, then command-line flags.
//! - `SOCKFD_HARNESS_HOST`: IPv4 host scenarios bind and connect to
//!   (default `127.0.0.1`).
//! - `SOCKFD_HARNESS_TIMEOUT`: the short timeout, in seconds, used by
//!   scenarios that expect a wait to elapse (default `0.05`).
//! - `SOCKFD_HARNESS_LEVEL`: minimum log level, parsed loosely
//!   (default `info`).

use crate::structured_log::LogLevel;

pub const HOST_ENV: &str = "SOCKFD_HARNESS_HOST";
pub const TIMEOUT_ENV: &str = "SOCKFD_HARNESS_TIMEOUT";
pub const LEVEL_ENV: &str = "SOCKFD_HARNESS_LEVEL";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_SHORT_TIMEOUT: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub host: String,
    pub short_timeout: f64,
    pub min_level: LogLevel,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            short_timeout: DEFAULT_SHORT_TIMEOUT,
            min_level: LogLevel::Info,
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unusable values leave the field as is.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(timeout) = lookup(TIMEOUT_ENV).and_then(|raw| parse_timeout(&raw)) {
            self.short_timeout = timeout;
        }
        if let Some(level) = lookup(LEVEL_ENV) {
            self.min_level = LogLevel::from_str_loose(&level);
        }
        self
    }

    /// Apply command-line flags that were given.
    #[must_use]
    pub fn with_flags(
        mut self,
        host: Option<String>,
        short_timeout: Option<f64>,
        level: Option<&str>,
    ) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(timeout) = short_timeout.filter(|t| is_usable_timeout(*t)) {
            self.short_timeout = timeout;
        }
        if let Some(level) = level {
            self.min_level = LogLevel::from_str_loose(level);
        }
        self
    }
}

fn parse_timeout(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| is_usable_timeout(*t))
}

// Scenarios need a wait that can actually elapse.
fn is_usable_timeout(t: f64) -> bool {
    t.is_finite() && t > 0.0
}
