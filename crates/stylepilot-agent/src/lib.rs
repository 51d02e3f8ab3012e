//! LLM orchestration core for stylepilot.
//!
//! This crate drives a multi-turn, tool-using conversation with one of
//! several LLM providers to produce CSS for a target document.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ AgentRunner  │────>│  LlmClient  │────>│ vendor HTTP  │
//! │ (turn loop)  │     │ (adapters)  │     │ (3 formats)  │
//! └──────┬───────┘     └─────────────┘     └──────────────┘
//!        │
//!        ├────> ToolExecutor    (inspect, apply_css, ...)
//!        ├────> ContextMonitor  (document identity)
//!        └────> CheckpointStore (resume after interruption)
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- Provider adapter layer and tool-calling normalizer.
//! - [`runtime`] -- The agent loop.
//! - [`checkpoint`] -- Checkpoint persistence and image pruning.
//! - [`tools`] -- The fixed tool set and collaborator traits.
//! - [`css`] -- CSS extraction from model output.
//! - [`color`] -- Color parsing and WCAG contrast.
//! - [`prompt`] -- System and initial prompts.
//! - [`config`] -- Settings.
//! - [`error`] -- Agent error types.

pub mod checkpoint;
pub mod color;
pub mod config;
pub mod css;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;

// Re-export the most commonly used types at the crate root.
pub use checkpoint::{AgentCheckpoint, CheckpointStore, PRUNED_IMAGE_MARKER, prune_images};
pub use color::{ContrastReport, Rgba, check_contrast, contrast_ratio, parse_color};
pub use config::{AgentSettings, ProviderSettings, Settings};
pub use css::{extract_css, looks_like_css};
pub use error::{AgentError, Result};
pub use llm::{
    CompletionRequest, CompletionResult, ContentPart, Credential, LlmClient, Message, Provider,
    ProviderConfig, Role, ToolCall, ToolDefinition, Usage,
};
pub use runtime::{
    AgentOptions, AgentOutcome, AgentRunner, ProgressCallback, SessionContext, TurnProgress,
};
pub use tools::{ContextMonitor, FixedContext, ToolExecutor, ToolOutput, tool_definitions};
