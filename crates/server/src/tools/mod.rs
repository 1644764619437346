//! MCP tool implementations.
//!
//! Every tool answers with one pretty-printed JSON text block.

pub mod events;
pub mod fetch;
pub mod lifecycle;
pub mod namespaces;

use offgrid_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub use events::{NotificationClickParams, PushParams, SyncParams};
pub use fetch::FetchParams;

fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) fn output_json(result: &CallToolResult) -> serde_json::Value {
    let text = result.content[0].as_text().unwrap();
    serde_json::from_str(&text.text).unwrap()
}
