//! Chat-completion HTTP client for Hearth.

mod client;

pub use client::ChatClient;
