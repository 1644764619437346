//! MCP server handler implementation.
//!
//! Each tool stands in for one event the hosting runtime would deliver to
//! the worker: install, activate, fetch, sync, push and notificationclick.
use std::sync::Arc;

use crate::state::Worker;
use crate::tools::{
    FetchParams, NotificationClickParams, PushParams, SyncParams, events, fetch, lifecycle, namespaces,
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

/// The main MCP server handler for the offgrid worker.
#[derive(Clone)]
pub struct OffgridServer {
    worker: Arc<Worker>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OffgridServer {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    #[tool(description = "Route one request through the offline cache. Returns the response, where it came from \
                          (network, cache, fallback or passthrough), its category and the strategy used.")]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch::fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Install this version: pre-populate the static cache with critical assets and \
                          high-priority routes. Activates immediately when skip_waiting is set.")]
    async fn install(&self) -> Result<CallToolResult, McpError> {
        lifecycle::install_impl(&self.worker).await
    }

    #[tool(description = "Activate this version: destroy caches from other versions and take over request routing.")]
    async fn activate(&self) -> Result<CallToolResult, McpError> {
        lifecycle::activate_impl(&self.worker).await
    }

    #[tool(description = "Current lifecycle state and whether this instance controls routing.")]
    async fn lifecycle_state(&self) -> Result<CallToolResult, McpError> {
        lifecycle::state_impl(&self.worker)
    }

    #[tool(description = "List cache namespaces with entry counts, flagging those from other versions.")]
    async fn namespaces(&self) -> Result<CallToolResult, McpError> {
        namespaces::namespaces_impl(&self.worker).await
    }

    #[tool(description = "Deliver a sync event. Tag \"background-sync\" posts SYNC_OFFLINE_DATA to every client.")]
    async fn sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        events::sync_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a push message. Shows a notification with the payload as its body.")]
    async fn push(&self, params: Parameters<PushParams>) -> Result<CallToolResult, McpError> {
        events::push_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a notification click. Action \"open-app\" opens the primary view.")]
    async fn notification_click(
        &self, params: Parameters<NotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        events::notification_click_impl(&self.worker, params.0).await
    }

    #[tool(description = "Drain messages posted to the host client and windows opened since the last poll.")]
    async fn poll_messages(&self) -> Result<CallToolResult, McpError> {
        events::poll_impl(&self.worker).await
    }
}

impl ServerHandler for OffgridServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offgrid-worker".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::worker;

    #[tokio::test]
    async fn test_every_event_has_a_tool() {
        let server = OffgridServer::new(Arc::new(worker(&[]).await));
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            [
                "activate",
                "fetch",
                "install",
                "lifecycle_state",
                "namespaces",
                "notification_click",
                "poll_messages",
                "push",
                "sync"
            ]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = OffgridServer::new(Arc::new(worker(&[]).await));
        assert_eq!(server.get_info().server_info.name, "offgrid-worker");
    }
}
