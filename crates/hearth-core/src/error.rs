//! Error type for chat exchanges.

use hearth_mcp::McpError;
use hearth_types::ApiError;
use thiserror::Error;

/// A failed exchange. Any round failing aborts the whole exchange; the
/// caller's history is left untouched.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Tool(#[from] McpError),

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}
