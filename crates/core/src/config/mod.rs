//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (VOKABEL_*)
//! 2. TOML config file (if VOKABEL_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Paths stored in the app-shell generation at install time.
pub const DEFAULT_PRECACHE_URLS: &[&str] = &[
    "/",
    "/index.html",
    "/display.html",
    "/montigame.html",
    "/irrverbtrainer.html",
    "/teacher-dashboard.html",
    "/overview.html",
    "/images/montiwhite.png",
    "/images/montigame.jpg",
    "/images/montilanded.jpg",
    "/images/icons/icon-192.png",
    "/images/icons/icon-512.png",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (VOKABEL_*)
/// 2. TOML config file (if VOKABEL_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache storage database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the intercepting HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the app origin every intercepted request is forwarded to.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum upstream response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Name of the current app-shell generation. Bump to roll out a new shell.
    #[serde(default = "default_shell_cache")]
    pub shell_cache: String,

    /// Name of the runtime generation filled by write-through.
    #[serde(default = "default_runtime_cache")]
    pub runtime_cache: String,

    /// Absolute paths precached into the app-shell generation.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Hostname substring identifying the real-time backend.
    #[serde(default = "default_live_host_pattern")]
    pub live_host_pattern: String,

    /// App-shell page served to offline navigations.
    #[serde(default = "default_app_shell_entry")]
    pub app_shell_entry: String,

    /// Message in the JSON body returned when content is unavailable offline.
    #[serde(default = "default_offline_message")]
    pub offline_message: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./vokabel-cache.sqlite")
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_user_agent() -> String {
    "vokabel-worker/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_shell_cache() -> String {
    "lmg-vocab-v1".into()
}

fn default_runtime_cache() -> String {
    "lmg-vocab-runtime".into()
}

fn default_precache_urls() -> Vec<String> {
    DEFAULT_PRECACHE_URLS.iter().map(|s| s.to_string()).collect()
}

fn default_live_host_pattern() -> String {
    "firebase".into()
}

fn default_app_shell_entry() -> String {
    "/index.html".into()
}

fn default_offline_message() -> String {
    "Offline - Vokabeln nicht verfügbar".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            shell_cache: default_shell_cache(),
            runtime_cache: default_runtime_cache(),
            precache_urls: default_precache_urls(),
            live_host_pattern: default_live_host_pattern(),
            app_shell_entry: default_app_shell_entry(),
            offline_message: default_offline_message(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed origin URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Precache manifest resolved against the origin, in manifest order.
    pub fn precache_manifest(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.origin_url()?;
        self.precache_urls
            .iter()
            .map(|path| {
                origin
                    .join(path)
                    .map_err(|e| ConfigError::Invalid { field: "precache_urls".into(), reason: format!("{path}: {e}") })
            })
            .collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("VOKABEL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("VOKABEL_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
