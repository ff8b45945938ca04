//! Worker control tools: messages, status and updates.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use vokabel_client::{ControlMessage, Lifecycle, WorkerEvent};

use crate::error::{ToolError, json_result};
use crate::host::WorkerHost;

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message type: "SKIP_WAITING" or "CLEAR_CACHE".
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageOutput {
    pub handled: String,
    /// Generations left after the message ran.
    pub caches: Vec<String>,
}

pub async fn message_impl(host: &WorkerHost, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let raw = serde_json::json!({ "type": params.kind }).to_string();
    let message: ControlMessage = raw.parse()?;

    let promoted = message == ControlMessage::SkipWaiting && host.registration().skip_waiting().await?;
    if !promoted {
        let worker = host.worker().await.ok_or(ToolError::NoController)?;
        worker.dispatch(WorkerEvent::Message(message)).await?;
    }

    let caches = host.db().cache_names().await?;
    json_result(&WorkerMessageOutput { handled: params.kind, caches })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInfo {
    pub id: u64,
    pub state: String,
    pub controlling: bool,
}

impl From<&Lifecycle> for WorkerInfo {
    fn from(lifecycle: &Lifecycle) -> Self {
        Self {
            id: lifecycle.id().get(),
            state: lifecycle.state().as_str().into(),
            controlling: lifecycle.is_controlling(),
        }
    }
}

/// Output from the worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusOutput {
    pub active: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
    pub shell_cache: String,
    pub runtime_cache: String,
    pub caches: Vec<String>,
}

pub async fn status_impl(host: &WorkerHost) -> Result<CallToolResult, McpError> {
    let registration = host.registration();
    let active = registration.controller().await.map(|w| WorkerInfo::from(w.as_ref()));
    let waiting = registration.waiting().await.map(|w| WorkerInfo::from(w.as_ref()));
    let config = host.config();

    json_result(&WorkerStatusOutput {
        active,
        waiting,
        shell_cache: config.shell_cache.clone(),
        runtime_cache: config.runtime_cache.clone(),
        caches: host.db().cache_names().await?,
    })
}

/// Install a fresh worker against the current manifest.
pub async fn update_impl(host: &WorkerHost) -> Result<CallToolResult, McpError> {
    let lifecycle = host.boot_worker().await?;
    json_result(&WorkerInfo::from(lifecycle.as_ref()))
}
