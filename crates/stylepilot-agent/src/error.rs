//! Agent error types.
//!
//! Every subsystem surfaces failures through [`AgentError`]. The variants
//! follow the orchestration taxonomy: request problems are never retried,
//! provider problems may be retried by the caller, and a context change is
//! a controlled stop rather than a failure.

use stylepilot_store::StoreError;

/// Unified error type for the orchestration core.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Request errors ------------------------------------------------------
    /// The request is malformed or incomplete (no messages, bad tool set).
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// A credential, model, or endpoint is missing for the chosen provider.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    // -- Provider errors -----------------------------------------------------
    /// The provider answered with a non-success status or an error payload.
    #[error("{provider} error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The provider answered successfully but with nothing usable.
    #[error("{provider} returned an empty response{}", .detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
    EmptyResponse {
        provider: String,
        detail: Option<String>,
    },

    /// The HTTP request never produced a response.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    // -- Loop control --------------------------------------------------------
    /// The inspected document changed identity while the loop was running.
    #[error("target context changed since the run began")]
    AbortedByContextChange,

    /// A tool collaborator reported a failure.
    #[error("tool `{tool_name}` failed: {reason}")]
    ToolExecutionFailed { tool_name: String, reason: String },

    // -- Upstream crate errors -----------------------------------------------
    /// The checkpoint store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether a caller-level policy may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Transport { .. })
    }
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            reason: err.to_string(),
        }
    }
}
