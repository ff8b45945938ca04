//! URL canonicalization for consistent cache identities.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for vokabel_core::Error {
    fn from(err: UrlError) -> Self {
        vokabel_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a URL string so equal resources share one cache identity.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve the path and query of an intercepted request against the origin.
///
/// Only the origin's scheme, host and port are used; `path_and_query` must be
/// absolute (start with `/`). The target is never treated as a reference, so a
/// leading `//` stays part of the path instead of naming another host.
pub fn resolve_upstream(origin: &url::Url, path_and_query: &str) -> Result<url::Url, UrlError> {
    if !path_and_query.starts_with('/') {
        return Err(UrlError::InvalidUrl(format!("not an absolute path: {path_and_query}")));
    }
    let without_fragment = path_and_query.split('#').next().unwrap_or_default();
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };

    let mut resolved = origin.clone();
    resolved.set_path(path);
    resolved.set_query(query);
    resolved.set_fragment(None);
    Ok(resolved)
}
