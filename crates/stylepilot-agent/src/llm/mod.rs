//! Provider adapter layer.
//!
//! This module hides three structurally different vendor protocols behind a
//! single [`LlmClient::complete`] call. It is organized into:
//!
//! - [`types`] -- Provider-agnostic messages, tools, requests and results.
//! - [`provider`] -- Provider identity, credentials and endpoint resolution.
//! - [`tooling`] -- The tool-calling normalizer and three-way dispatch.
//! - [`openai`], [`anthropic`], [`google`] -- One wire translation per vendor.
//! - [`client`] -- The HTTP client.

pub mod anthropic;
pub mod client;
pub mod google;
pub mod openai;
pub mod provider;
pub mod tooling;
pub mod types;

// Re-export the most commonly used types for convenience.
pub use client::LlmClient;
pub use provider::{Credential, Provider, ProviderConfig, ResolvedEndpoint};
pub use tooling::ParsedResponse;
pub use types::{
    CompletionRequest, CompletionResult, ContentPart, Message, MessageContent, Role, ToolCall,
    ToolDefinition, Usage,
};
