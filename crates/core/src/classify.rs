//! Request classification.
//!
//! Maps a request URL and method to the strategy the router should use.
//! Rules are checked in order:
//!
//! 1. Non-http(s) scheme: not intercepted at all.
//! 2. Host matches the live backend pattern: [`RoutingClass::Live`].
//! 3. Path is vocabulary or grammar content: [`RoutingClass::Volatile`].
//! 4. Everything else: [`RoutingClass::Static`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

static VOCAB_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/vocab/english/voc\d+_4\.json").unwrap());

static GRAMMAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/grammar/irrverbs\d*\.json").unwrap());

/// Routing strategy for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingClass {
    /// Network only, never cached.
    Live,
    /// Network first, cached copy on failure, cache refreshed on success.
    Volatile,
    /// Cache first, network on miss with cache fill.
    Static,
}

/// Result of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Leave the request alone; the host fetches it normally.
    Ignore,
    Route(RoutingClass),
}

/// Pure request classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    live_host_pattern: String,
}

impl Classifier {
    /// `live_host_pattern` is matched as a substring of the hostname.
    pub fn new(live_host_pattern: impl Into<String>) -> Self {
        Self { live_host_pattern: live_host_pattern.into().to_ascii_lowercase() }
    }

    /// Classify a request.
    ///
    /// The method does not influence the class; it only matters later when
    /// the static strategy decides whether a response may be cached.
    pub fn classify(&self, url: &Url, _method: &str) -> Classification {
        if !matches!(url.scheme(), "http" | "https") {
            return Classification::Ignore;
        }

        if !self.live_host_pattern.is_empty()
            && url
                .host_str()
                .is_some_and(|host| host.to_ascii_lowercase().contains(&self.live_host_pattern))
        {
            return Classification::Route(RoutingClass::Live);
        }

        let path = url.path();
        if VOCAB_PATTERN.is_match(path) || GRAMMAR_PATTERN.is_match(path) {
            return Classification::Route(RoutingClass::Volatile);
        }

        Classification::Route(RoutingClass::Static)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new("firebase")
    }
}
