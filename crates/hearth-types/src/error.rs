//! Error types for the chat-completion endpoint.

use thiserror::Error;

/// Errors from the chat-completion API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode completion response: {0}")]
    Decode(String),

    #[error("Request timeout")]
    Timeout,
}
