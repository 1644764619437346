//! install, activate and lifecycle_state tools.

use offgrid_client::{ActivationReport, InstallReport, LifecycleState};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use super::json_result;
use crate::state::Worker;

#[derive(Debug, Clone, Serialize)]
pub struct InstallOutput {
    pub version: String,
    pub state: LifecycleState,
    #[serde(flatten)]
    pub report: InstallReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivateOutput {
    pub version: String,
    pub state: LifecycleState,
    #[serde(flatten)]
    pub report: ActivationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateOutput {
    pub version: String,
    pub state: LifecycleState,
    pub controlling: bool,
}

pub async fn install_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let report = worker.lifecycle.install().await?;
    json_result(&InstallOutput {
        version: worker.lifecycle.version().to_string(),
        state: worker.lifecycle.state(),
        report,
    })
}

pub async fn activate_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let report = worker.lifecycle.activate().await?;
    json_result(&ActivateOutput {
        version: worker.lifecycle.version().to_string(),
        state: worker.lifecycle.state(),
        report,
    })
}

pub fn state_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    json_result(&StateOutput {
        version: worker.lifecycle.version().to_string(),
        state: worker.lifecycle.state(),
        controlling: worker.lifecycle.is_controlling(),
    })
}
