//! MCP (Model Context Protocol) client implementation for Hearth.
//!
//! Talks to MCP servers over an HTTP+SSE transport: a long-lived GET carries
//! `event:`/`data:` frames from the server, and JSON-RPC 2.0 requests are
//! POSTed to a session-specific message URL announced on that stream. Each
//! logical operation opens a session, runs the `initialize` handshake, and
//! issues its target method; responses arrive asynchronously on the stream
//! and are correlated back to their requests by message id.

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod registry;
pub mod sse;
pub mod tool;
pub mod transport;

pub use client::McpClient;
pub use config::ServerConfig;
pub use error::{McpError, TransportError};
pub use registry::{ToolBackend, ToolRegistry};
pub use tool::{ToolCallResult, ToolDescriptor};
pub use transport::{Session, SseTransport};
