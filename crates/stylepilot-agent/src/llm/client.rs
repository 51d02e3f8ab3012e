//! HTTP client for the provider adapter layer.
//!
//! [`LlmClient::complete`] is the single entry point: it resolves the
//! provider configuration, normalizes the conversation, encodes it for the
//! vendor, performs the call, and decodes the answer. No retries happen
//! here; callers decide whether an error is worth another attempt.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde_json::Value;

use super::provider::ResolvedEndpoint;
use super::tooling;
use super::types::{CompletionRequest, CompletionResult, normalize_messages};
use crate::error::{AgentError, Result};

/// Per-request timeout applied by the underlying HTTP client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest slice of a raw error body echoed back to the caller.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Multi-provider completion client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a client with the default timeout.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::Transport {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http })
    }

    /// Run one non-streaming completion.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let endpoint = request.provider.resolve()?;

        let messages = normalize_messages(&request.messages);
        if messages.is_empty() {
            return Err(AgentError::validation(
                "no non-empty messages left after normalization",
            ));
        }
        tooling::validate_tools(&request.tools)?;

        let body = tooling::build_request_body(endpoint.provider, &endpoint.model, request, &messages);

        tracing::debug!(
            provider = %endpoint.provider,
            model = %endpoint.model,
            url = %endpoint.url,
            messages = messages.len(),
            tools = request.tools.len(),
            "sending LLM request"
        );

        let started = Instant::now();
        let raw = self.send(&endpoint, &body).await?;
        let parsed = tooling::parse_response(endpoint.provider, &raw)?;

        tracing::info!(
            provider = %endpoint.provider,
            model = %endpoint.model,
            latency_ms = started.elapsed().as_millis() as u64,
            tool_calls = parsed.tool_calls.len(),
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "LLM response received"
        );

        Ok(CompletionResult {
            provider: endpoint.provider,
            model: endpoint.model,
            text: parsed.text,
            tool_calls: parsed.tool_calls,
            usage: parsed.usage,
            raw,
        })
    }

    async fn send(&self, endpoint: &ResolvedEndpoint, body: &Value) -> Result<Value> {
        let mut builder = self.http.post(&endpoint.url).json(body);
        for (name, value) in &endpoint.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = tooling::parse_error_message(endpoint.provider, &text)
                .unwrap_or_else(|| fallback_error_message(status, &text));
            tracing::warn!(
                provider = %endpoint.provider,
                status = status.as_u16(),
                %message,
                "LLM request failed"
            );
            return Err(AgentError::Provider {
                provider: endpoint.provider.to_string(),
                status: Some(status.as_u16()),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| AgentError::Provider {
            provider: endpoint.provider.to_string(),
            status: Some(status.as_u16()),
            message: format!("invalid JSON in response body: {e}"),
        })
    }
}

/// The truncated raw body, or the status reason when the body is empty.
fn fallback_error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned();
    }
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_owned();
    }
    let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{truncated}...")
}
