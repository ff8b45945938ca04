//! cache_delete tool implementation.
//!
//! Drops one generation and every entry stored in it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ToolError, json_result};
use crate::host::WorkerHost;

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Generation name, e.g. "lmg-vocab-runtime".
    pub name: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    /// False when no generation had that name.
    pub deleted: bool,
}

pub async fn delete_impl(host: &WorkerHost, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    if params.name.trim().is_empty() {
        return Err(ToolError::InvalidInput("name must not be empty".into()).into());
    }

    let deleted = host.db().delete_cache(&params.name).await?;
    tracing::info!(generation = %params.name, deleted, "cache_delete");
    json_result(&CacheDeleteOutput { deleted })
}
