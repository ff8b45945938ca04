//! MCP control-channel handler.
//!
//! Routes tool calls to the worker and cache tools.
use std::sync::Arc;

use crate::host::WorkerHost;
use crate::tools::{
    CacheDeleteParams, CacheMatchParams, WorkerMessageParams,
    cache::{delete_impl, match_impl, names_impl},
    worker::{message_impl, status_impl, update_impl},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// Control channel for a running worker host.
#[derive(Clone)]
pub struct WorkerControl {
    host: Arc<WorkerHost>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl WorkerControl {
    pub fn new(host: Arc<WorkerHost>) -> Self {
        Self { host, tool_router: Self::tool_router() }
    }

    #[tool(description = "Send a control message to the active worker. type is SKIP_WAITING or CLEAR_CACHE.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.host, params.0).await
    }

    #[tool(description = "Report the active and waiting workers and the current cache generations.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.host).await
    }

    /// Installs a new worker; the old one is retired once the new one activates.
    #[tool(description = "Install a fresh worker from the precache manifest and let it take control.")]
    async fn worker_update(&self) -> Result<CallToolResult, McpError> {
        update_impl(&self.host).await
    }

    #[tool(description = "List cache generations with their creation time and entry count.")]
    async fn cache_names(&self) -> Result<CallToolResult, McpError> {
        names_impl(&self.host).await
    }

    #[tool(description = "Look up a stored response by URL (absolute or origin-relative path) and method.")]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        match_impl(&self.host, params.0).await
    }

    #[tool(description = "Delete one cache generation and all of its entries.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.host, params.0).await
    }
}

impl ServerHandler for WorkerControl {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "vokabel-worker".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
