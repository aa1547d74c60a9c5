//! The bounded tool-calling exchange loop.

use crate::error::OrchestrationError;
use hearth_mcp::{ServerConfig, ToolRegistry};
use hearth_types::{
    ChatCompletionRequest, CompletionProvider, ConversationMessage, ReasoningEffort, ToolCall,
    ToolDefinition,
};
use std::sync::Arc;

/// Maximum tool rounds per exchange. A reply that still carries a tool call
/// after the bound is not executed; its content is returned as-is.
pub const MAX_TOOL_ROUNDS: usize = 3;

/// Progress events emitted in order during an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The model produced "thinking" text. Informational only.
    ReasoningReceived(String),
    ToolCallStarted { name: String },
    ToolCallFinished { name: String, is_error: bool },
    Completed,
}

/// Per-exchange settings, passed as an immutable snapshot.
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    pub model: String,
    pub servers: Vec<ServerConfig>,
    pub tools_enabled: bool,
    pub reasoning: Option<ReasoningEffort>,
}

/// The result of a successful exchange.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// The model's final answer text.
    pub content: String,
    /// Reasoning attached to the final reply, if any.
    pub reasoning: Option<String>,
    /// The full post-exchange message list: the caller's history plus the
    /// user turn, any tool-call rounds, and the final assistant message.
    pub messages: Vec<ConversationMessage>,
}

/// Runs chat exchanges against a completion provider, resolving the model's
/// tool calls through the MCP tool registry.
pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    registry: ToolRegistry,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn CompletionProvider>, registry: ToolRegistry) -> Self {
        Self { provider, registry }
    }

    /// Run one user turn to completion.
    ///
    /// Works on an owned copy of `history`: on error nothing is mutated, on
    /// success the updated list comes back in the outcome.
    pub async fn run_exchange(
        &self,
        history: &[ConversationMessage],
        user_text: &str,
        settings: &ExchangeSettings,
        mut on_event: impl FnMut(ChatEvent),
    ) -> Result<ChatOutcome, OrchestrationError> {
        let mut messages = history.to_vec();
        messages.push(ConversationMessage::user(user_text));

        let tools = self.gather_tools(settings).await;
        let mode = settings.reasoning.map(|effort| effort.mode().to_string());

        let mut rounds = 0;
        loop {
            let request = ChatCompletionRequest {
                model: settings.model.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                mode: mode.clone(),
            };
            tracing::debug!(
                "Requesting completion from '{}' (round {rounds})",
                self.provider.name()
            );
            let response = self.provider.complete(&request).await?;
            let reply = response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| {
                    OrchestrationError::MalformedResponse("response carried no choices".into())
                })?
                .message;

            if let Some(reasoning) = &reply.reasoning {
                on_event(ChatEvent::ReasoningReceived(reasoning.clone()));
            }

            let call = reply.tool_call().filter(|_| rounds < MAX_TOOL_ROUNDS);
            let Some(call) = call.cloned() else {
                if reply.tool_call().is_some() {
                    tracing::warn!("Tool round limit reached, returning available content");
                }
                let content = reply.content.unwrap_or_default();
                let mut final_message = ConversationMessage::assistant(content.clone());
                final_message.reasoning = reply.reasoning.clone();
                messages.push(final_message);
                on_event(ChatEvent::Completed);
                return Ok(ChatOutcome {
                    content,
                    reasoning: reply.reasoning,
                    messages,
                });
            };

            rounds += 1;
            let result = self.execute_call(settings, &call, &mut on_event).await?;
            messages.push(ConversationMessage::assistant_tool_call(
                reply.content.clone(),
                vec![call.clone()],
            ));
            messages.push(ConversationMessage::tool_result(
                &call.id,
                &call.function.name,
                result,
            ));
        }
    }

    /// Collect tool definitions for the request, or `None` when tools are
    /// off or nothing is available (providers reject empty tool arrays).
    async fn gather_tools(&self, settings: &ExchangeSettings) -> Option<Vec<ToolDefinition>> {
        if !settings.tools_enabled || settings.servers.is_empty() {
            return None;
        }
        let definitions = self.registry.list_all_tools(&settings.servers).await;
        if definitions.is_empty() {
            None
        } else {
            tracing::debug!("Offering {} tools to the model", definitions.len());
            Some(definitions)
        }
    }

    async fn execute_call(
        &self,
        settings: &ExchangeSettings,
        call: &ToolCall,
        on_event: &mut impl FnMut(ChatEvent),
    ) -> Result<String, OrchestrationError> {
        let name = &call.function.name;
        on_event(ChatEvent::ToolCallStarted { name: name.clone() });

        // Argument strings come straight from the model and are not always
        // valid JSON; an unparsable payload degrades to no arguments.
        let arguments = serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
            tracing::warn!("Unparsable arguments for tool '{name}': {e}");
            serde_json::json!({})
        });

        let result = self
            .registry
            .call_tool(&settings.servers, name, arguments)
            .await?;
        on_event(ChatEvent::ToolCallFinished {
            name: name.clone(),
            is_error: result.is_error(),
        });
        Ok(result.message().to_string())
    }
}
