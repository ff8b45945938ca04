//! cache_names tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::json_result;
use crate::host::WorkerHost;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub created_at: Option<String>,
    pub entries: usize,
}

/// Output from the cache_names tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheNamesOutput {
    /// Generations, oldest first.
    pub generations: Vec<GenerationInfo>,
}

pub async fn names_impl(host: &WorkerHost) -> Result<CallToolResult, McpError> {
    let db = host.db();
    let mut generations = Vec::new();
    for name in db.cache_names().await? {
        let created_at = db.cache_created_at(&name).await?;
        let entries = db.count_entries(&name).await?;
        generations.push(GenerationInfo { name, created_at, entries });
    }
    json_result(&CacheNamesOutput { generations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::host;

    #[tokio::test]
    async fn test_names_after_boot() {
        let (host, _) = host().await;
        host.boot_worker().await.unwrap();

        let result = names_impl(&host).await.unwrap();
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
        let output: CacheNamesOutput = serde_json::from_str(text).unwrap();
        assert_eq!(output.generations.len(), 1);
        assert_eq!(output.generations[0].name, "lmg-vocab-v1");
        assert_eq!(output.generations[0].entries, 2);
    }
}
