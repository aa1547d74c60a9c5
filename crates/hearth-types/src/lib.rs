//! Shared types and error hierarchy for Hearth.

pub mod error;
pub mod message;
pub mod provider;

pub use error::ApiError;
pub use message::*;
pub use provider::CompletionProvider;
