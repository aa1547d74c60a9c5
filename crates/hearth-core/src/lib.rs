//! Chat exchange orchestration for Hearth.
//!
//! Drives one user turn end to end: sends the conversation to a completion
//! provider, executes any MCP tool calls the model requests, feeds the
//! results back, and repeats up to a bounded number of tool rounds before
//! returning the model's final answer.

pub mod error;
pub mod orchestrator;

pub use error::OrchestrationError;
pub use orchestrator::{
    ChatEvent, ChatOutcome, ExchangeSettings, MAX_TOOL_ROUNDS, Orchestrator,
};
