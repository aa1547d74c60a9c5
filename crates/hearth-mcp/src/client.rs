//! MCP protocol client: handshake, tool discovery, tool invocation.
//!
//! Sessions are per-operation: each `list_tools` or `call_tool` opens a
//! fresh SSE session, performs the `initialize` handshake, runs its request,
//! and drops the session. Discovered tool lists are cached per server id,
//! keyed by the connection fingerprint so edits to the endpoint, token, or
//! enablement invalidate stale entries.

use crate::config::ServerConfig;
use crate::error::{McpError, TransportError};
use crate::tool::{ToolCallResult, ToolDescriptor};
use crate::transport::{PROTOCOL_VERSION, Session, SseTransport};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// How long to wait for the `initialize` response. Some servers never frame
/// it as a distinct SSE message, so its absence is tolerated.
const HANDSHAKE_WAIT: Duration = Duration::from_secs(2);

type ToolCache = Mutex<HashMap<Uuid, (String, Arc<Vec<ToolDescriptor>>)>>;

/// Client for one-or-more MCP servers, with a per-server tool list cache.
pub struct McpClient {
    transport: SseTransport,
    cache: ToolCache,
}

impl McpClient {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            transport: SseTransport::new()?,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Discover the tools a server advertises. Served from cache while the
    /// server's connection fingerprint is unchanged.
    pub async fn list_tools(
        &self,
        config: &ServerConfig,
    ) -> Result<Arc<Vec<ToolDescriptor>>, McpError> {
        if let Some(tools) = self.cached_tools(config) {
            tracing::debug!("Using cached tool list for '{}'", config.name);
            return Ok(tools);
        }

        let session = self.transport.open_session(config).await?;
        self.handshake(&session, config).await?;

        let response = session.request("tools/list", None).await?;
        if let Some(error) = response.error {
            return Err(McpError::JsonRpc {
                server: config.name.clone(),
                code: error.code,
                message: error.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| McpError::MalformedResult("tools/list returned no result".into()))?;
        let tools = Arc::new(parse_tools(&result));
        tracing::info!("Discovered {} tools from '{}'", tools.len(), config.name);

        self.store_tools(config, Arc::clone(&tools));
        Ok(tools)
    }

    /// Invoke a tool on a server. A JSON-RPC error or an `isError` result is
    /// returned as `ToolCallResult::Error`, not as an `Err`: failed tool
    /// calls are fed back to the model as information.
    pub async fn call_tool(
        &self,
        config: &ServerConfig,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        let session = self.transport.open_session(config).await?;
        self.handshake(&session, config).await?;

        tracing::info!("Calling tool '{name}' on '{}'", config.name);
        let params = json!({ "name": name, "arguments": arguments });
        let response = session.request("tools/call", Some(params)).await?;

        if let Some(error) = response.error {
            return Ok(ToolCallResult::Error(format!(
                "Tool call failed (code {}): {}",
                error.code, error.message
            )));
        }
        let result = response
            .result
            .ok_or_else(|| McpError::MalformedResult("tools/call returned no result".into()))?;
        Ok(parse_call_result(&result))
    }

    /// Drop the cached tool list for a server, forcing rediscovery.
    pub fn clear_cache(&self, server_id: Uuid) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&server_id);
        }
    }

    async fn handshake(&self, session: &Session, config: &ServerConfig) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "hearth",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let response = session
            .request_lenient("initialize", Some(params), HANDSHAKE_WAIT)
            .await?;
        match response {
            Some(response) => {
                if let Some(error) = response.error {
                    return Err(McpError::Handshake {
                        server: config.name.clone(),
                        message: error.message,
                    });
                }
            }
            None => {
                tracing::debug!(
                    "No initialize response from '{}', proceeding anyway",
                    config.name
                );
            }
        }
        session.notify("notifications/initialized", None).await?;
        Ok(())
    }

    fn cached_tools(&self, config: &ServerConfig) -> Option<Arc<Vec<ToolDescriptor>>> {
        let cache = self.cache.lock().ok()?;
        let (fingerprint, tools) = cache.get(&config.id)?;
        (*fingerprint == config.fingerprint()).then(|| Arc::clone(tools))
    }

    fn store_tools(&self, config: &ServerConfig, tools: Arc<Vec<ToolDescriptor>>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(config.id, (config.fingerprint(), tools));
        }
    }
}

/// Extract tool descriptors from a `tools/list` result. Entries without a
/// name are dropped rather than failing the whole list.
fn parse_tools(result: &Value) -> Vec<ToolDescriptor> {
    let Some(entries) = result.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::warn!("Skipping malformed tool entry: {e}");
                None
            }
        })
        .filter(|descriptor: &ToolDescriptor| !descriptor.name.is_empty())
        .collect()
}

/// Extract the human-readable outcome of a `tools/call` result.
///
/// Joins the text items of the `content` array; falls back to a top-level
/// `message` field, then to a plain success sentinel for servers that return
/// an empty result body.
fn parse_call_result(result: &Value) -> ToolCallResult {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|joined| !joined.is_empty())
        .or_else(|| {
            result
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        });

    match (is_error, text) {
        (true, Some(text)) => ToolCallResult::Error(text),
        (true, None) => ToolCallResult::Error("Tool call failed".to_string()),
        (false, Some(text)) => ToolCallResult::Text(text),
        (false, None) => ToolCallResult::Text("Success".to_string()),
    }
}
