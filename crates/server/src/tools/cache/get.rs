//! cache_match tool implementation.
//!
//! Looks a request up across generations the same way the router does.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;
use vokabel_client::fetch::{canonicalize, resolve_upstream};
use vokabel_core::{Error, RequestIdentity};

use crate::error::{ToolError, json_result};
use crate::host::WorkerHost;

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// Body as UTF-8 (lossy).
    pub body: String,
}

pub async fn match_impl(host: &WorkerHost, params: CacheMatchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(host, &params.url)?;
    let identity = RequestIdentity::new(&params.method, &url);
    let config = host.config();
    let precedence = [config.runtime_cache.as_str(), config.shell_cache.as_str()];

    let snapshot = host
        .db()
        .match_request(&identity, &precedence)
        .await?
        .ok_or_else(|| Error::CacheMiss(identity.to_string()))?;

    json_result(&CacheMatchOutput {
        method: identity.method,
        url: identity.url,
        status: snapshot.status,
        status_text: snapshot.status_text,
        headers: snapshot.headers,
        body: String::from_utf8_lossy(&snapshot.body).into_owned(),
    })
}

fn resolve(host: &WorkerHost, input: &str) -> Result<Url, ToolError> {
    if input.starts_with('/') {
        let origin = host.config().origin_url().map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        resolve_upstream(&origin, input).map_err(|e| ToolError::InvalidInput(format!("{input}: {e}")))
    } else {
        canonicalize(input).map_err(|e| ToolError::InvalidInput(format!("{input}: {e}")))
    }
}
