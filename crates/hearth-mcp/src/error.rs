//! Error types for MCP operations.

use thiserror::Error;

/// Errors from the SSE session transport.
///
/// Any of these is fatal to the session that produced it: callers discard
/// the session and open a fresh one rather than retrying in place.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {0}")]
    Http(u16),

    #[error("no endpoint frame within the read budget")]
    NoEndpoint,

    #[error("SSE frame exceeded the {limit} byte buffer cap")]
    FrameTooLarge { limit: usize },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("session stream closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from MCP protocol operations and tool resolution.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("handshake with '{server}' failed: {message}")]
    Handshake { server: String, message: String },

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("malformed result: {0}")]
    MalformedResult(String),

    #[error("no enabled server exposes tool '{name}'")]
    ToolNotFound { name: String },
}
