//! sync, push, notification_click and poll_messages tools.

use offgrid_client::{ClientId, ClientMessage, Notification};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::Worker;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    /// Sync tag; only "background-sync" is acted on.
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushParams {
    /// Notification body text.
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// Clicked action; only "open-app" is acted on.
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutput {
    pub handled: bool,
    pub delivered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushOutput {
    pub notification: Notification,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClickOutput {
    pub opened: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollOutput {
    pub client: ClientId,
    pub messages: Vec<ClientMessage>,
    pub opened_windows: Vec<String>,
}

pub async fn sync_impl(worker: &Worker, params: SyncParams) -> Result<CallToolResult, McpError> {
    let delivered = worker.events.on_sync(params.tag.trim()).await;
    json_result(&SyncOutput { handled: delivered.is_some(), delivered: delivered.unwrap_or(0) })
}

pub async fn push_impl(worker: &Worker, params: PushParams) -> Result<CallToolResult, McpError> {
    let notification = worker.events.on_external_message(params.payload.as_deref()).await?;
    json_result(&PushOutput { notification })
}

pub async fn notification_click_impl(
    worker: &Worker, params: NotificationClickParams,
) -> Result<CallToolResult, McpError> {
    let opened = worker.events.on_notification_click(params.action.trim()).await?;
    json_result(&ClickOutput { opened: opened.then(|| worker.config.primary_view_url.clone()) })
}

pub async fn poll_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    json_result(&PollOutput {
        client: worker.host_client(),
        messages: worker.drain_inbox().await,
        opened_windows: worker.hub.take_opened().await,
    })
}
