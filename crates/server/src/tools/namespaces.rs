//! namespaces tool implementation.
//!
//! Lists every cache namespace in storage, current version or not.

use offgrid_core::NamespaceRecord;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::Worker;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamespacesOutput {
    /// Version of the running instance.
    pub version: String,
    pub namespaces: Vec<NamespaceRecord>,
    /// Namespaces that activation would destroy.
    pub stale: Vec<String>,
}

pub async fn namespaces_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let version = worker.namespaces.version().to_string();
    let namespaces = worker.namespaces.records().await?;
    let stale = namespaces
        .iter()
        .filter(|r| r.version != version)
        .map(|r| r.physical_name.clone())
        .collect();

    json_result(&NamespacesOutput { version, namespaces, stale })
}
