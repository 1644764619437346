//! fetch tool implementation.
//!
//! Runs one intercepted request through the router.

use std::collections::BTreeMap;

use chrono::Utc;
use offgrid_client::fetch::{canonicalize, resolve};
use offgrid_core::{
    Destination, Error, InterceptedRequest, Method, RequestMode, ResourceCategory, ResponseSource, Strategy,
};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::Worker;

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET bypasses the cache.
    #[serde(default = "default_method")]
    pub method: Method,

    /// Request destination, e.g. "document", "image", "font".
    #[serde(default)]
    pub destination: Destination,

    /// Request mode; "navigate" marks a page navigation.
    #[serde(default)]
    pub mode: RequestMode,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> Method {
    Method::Get
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8, lossy for binary content.
    pub body: String,
    pub size: usize,
    pub source: ResponseSource,
    pub category: Option<ResourceCategory>,
    pub strategy: Option<Strategy>,
    /// ISO8601 timestamp of when the response was served.
    pub served_at: String,
}

impl FetchParams {
    fn into_request(self, worker: &Worker) -> Result<InterceptedRequest, Error> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("url cannot be empty".into()));
        }

        let parsed = if url.starts_with('/') {
            let origin = worker.config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
            resolve(&origin, url)
        } else {
            canonicalize(url)
        }
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let headers = self.headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        Ok(InterceptedRequest {
            method: self.method,
            url: parsed,
            destination: self.destination,
            mode: self.mode,
            headers,
        })
    }
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(worker: &Worker, params: FetchParams) -> Result<CallToolResult, McpError> {
    let request = params.into_request(worker)?;
    let served = worker.router.handle(&request).await?;

    let output = FetchOutput {
        url: request.url.to_string(),
        status: served.response.status,
        headers: served.response.headers.clone(),
        body: String::from_utf8_lossy(&served.response.body).into_owned(),
        size: served.response.body.len(),
        source: served.source,
        category: served.category,
        strategy: served.strategy,
        served_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    };

    json_result(&output)
}
