//! Provider trait for chat-completion backends.

use crate::{ApiError, ChatCompletionRequest, ChatCompletionResponse};
use std::future::Future;
use std::pin::Pin;

/// Trait for chat-completion backends.
///
/// Dyn-compatible so the orchestrator works with `Arc<dyn CompletionProvider>`
/// and tests can substitute a scripted backend.
pub trait CompletionProvider: Send + Sync {
    /// Send one chat-completion request and return the decoded response.
    fn complete<'a>(
        &'a self,
        request: &'a ChatCompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatCompletionResponse, ApiError>> + Send + 'a>>;

    /// Provider name for logging/display (e.g., "local").
    fn name(&self) -> &str;
}
