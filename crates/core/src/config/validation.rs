//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `origin` is not an http(s) URL
    /// - either cache name is empty, or both are the same
    /// - a precache path or `app_shell_entry` is not absolute
    ///
    /// Returns `ConfigError::Missing` if `user_agent` or `listen_addr` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Missing {
                field: "user_agent".into(),
                hint: "Set VOKABEL_USER_AGENT environment variable".into(),
            });
        }
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Missing {
                field: "listen_addr".into(),
                hint: "Set VOKABEL_LISTEN_ADDR environment variable".into(),
            });
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", "must use http or https"));
        }

        if self.shell_cache.is_empty() {
            return Err(invalid("shell_cache", "must not be empty"));
        }
        if self.runtime_cache.is_empty() {
            return Err(invalid("runtime_cache", "must not be empty"));
        }
        if self.shell_cache == self.runtime_cache {
            return Err(invalid("runtime_cache", "must differ from shell_cache"));
        }

        if let Some(path) = self.precache_urls.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "precache_urls".into(),
                reason: format!("{path} is not an absolute path"),
            });
        }
        if !self.app_shell_entry.starts_with('/') {
            return Err(invalid("app_shell_entry", "must be an absolute path"));
        }

        if !self.precache_urls.contains(&self.app_shell_entry) {
            tracing::warn!(
                entry = %self.app_shell_entry,
                "app_shell_entry is not precached; offline navigations fall back to it only once it was fetched"
            );
        }

        Ok(())
    }
}
