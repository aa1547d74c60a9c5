//! Configuration snapshot for an MCP server.
//!
//! Created and persisted by the host UI; consumed read-only here. Callers
//! pass an immutable snapshot per operation rather than reading ambient
//! global state.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

fn default_timeout() -> u64 {
    30000
}

fn default_enabled() -> bool {
    true
}

/// Connection settings for a single MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Stable identity across edits to the other fields.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    /// SSE entry point, e.g. "http://homeassistant:8123/mcp_server/sse".
    pub endpoint_url: String,
    /// Bearer token, sent only when `use_auth` is set.
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub use_auth: bool,
    /// Disabled servers are excluded from aggregation and tool calls.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Discovered tools the user exposes to the model; empty means all.
    #[serde(default)]
    pub selected_tools: Vec<String>,
    /// Timeout for session opens and response waits in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl ServerConfig {
    /// Cache key: a tool list fetched under one fingerprint is stale as soon
    /// as any of these connection settings change.
    pub fn fingerprint(&self) -> String {
        format!("{}|{}|{}", self.endpoint_url, self.access_token, self.enabled)
    }

    pub fn bearer(&self) -> Option<&str> {
        (self.use_auth && !self.access_token.is_empty()).then_some(self.access_token.as_str())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether the user has opted this tool into model exposure.
    pub fn exposes_tool(&self, name: &str) -> bool {
        self.selected_tools.is_empty() || self.selected_tools.iter().any(|t| t == name)
    }
}
