//! Tool-calling normalizer.
//!
//! Holds the rules every vendor shares (schema defaults, argument parsing,
//! call ids) and the three-way dispatch from [`Provider`] to the vendor
//! module that owns the wire shape.
//!
//! ```text
//!   ToolDefinition ──tools_to_wire──▶ vendor tool schema
//!   vendor response ─parse_response─▶ ToolCall { id, name, arguments }
//!   ToolCall ───tool_call_message───▶ vendor assistant turn
//!   tool result ─tool_result_message▶ vendor tool-result turn
//! ```

use std::collections::HashSet;

use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::provider::Provider;
use super::types::{CompletionRequest, ContentPart, Message, Role, ToolCall, ToolDefinition, Usage};
use super::{anthropic, google, openai};
use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Parsed responses
// ---------------------------------------------------------------------------

/// Text, tool calls and usage pulled out of a vendor response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl ParsedResponse {
    /// Reject a response that carries neither text nor tool calls.
    pub(crate) fn non_empty(self, provider: Provider, detail: Option<String>) -> Result<Self> {
        if self.text.trim().is_empty() && self.tool_calls.is_empty() {
            return Err(AgentError::EmptyResponse {
                provider: provider.to_string(),
                detail,
            });
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Shared rules
// ---------------------------------------------------------------------------

/// Coerce a parameter schema into an object schema.
///
/// Anything that is not recognisably an object schema becomes
/// `{"type": "object", "properties": {}}`.
pub fn normalize_schema(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return empty_schema();
    };
    let is_object = match obj.get("type") {
        None => obj.contains_key("properties"),
        Some(ty) => ty == "object",
    };
    if !is_object {
        return empty_schema();
    }

    let mut out = obj.clone();
    out.insert("type".into(), json!("object"));
    if !out.get("properties").is_some_and(Value::is_object) {
        out.insert("properties".into(), Value::Object(Map::new()));
    }
    Value::Object(out)
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Tool names must be non-empty and unique within one request.
pub fn validate_tools(tools: &[ToolDefinition]) -> Result<()> {
    let mut seen = HashSet::with_capacity(tools.len());
    for tool in tools {
        let name = tool.name.trim();
        if name.is_empty() {
            return Err(AgentError::validation("tool definition with an empty name"));
        }
        if !seen.insert(name) {
            return Err(AgentError::validation(format!(
                "duplicate tool name `{name}`"
            )));
        }
    }
    Ok(())
}

/// Best-effort argument parsing.
///
/// Objects pass through, stringified JSON objects are decoded, and anything
/// else (including malformed JSON) degrades to `{}`.
pub fn parse_arguments(raw: &Value) -> Value {
    match raw {
        Value::Object(_) => raw.clone(),
        Value::String(s) if s.trim().is_empty() => json!({}),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => parsed,
            Ok(_) => json!({}),
            Err(e) => {
                tracing::debug!(error = %e, "malformed tool arguments, using {{}}");
                json!({})
            }
        },
        _ => json!({}),
    }
}

/// The vendor-supplied id, or a fresh `call_<uuid>` when it is missing.
pub fn ensure_call_id(id: Option<&str>) -> String {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => format!("call_{}", Uuid::now_v7().simple()),
    }
}

/// Required properties declared by `definition` that `arguments` lacks.
pub fn required_arguments_missing(definition: &ToolDefinition, arguments: &Value) -> Vec<String> {
    definition.parameters["required"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|name| arguments.get(*name).is_none_or(Value::is_null))
        .map(str::to_owned)
        .collect()
}

pub(crate) fn token_count(value: &Value) -> u32 {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// History segmentation
// ---------------------------------------------------------------------------

/// A slice of history as the vendor encoders see it: single messages, and
/// runs of consecutive tool results that some vendors merge into one turn.
pub(crate) enum Segment<'a> {
    Message(&'a Message),
    ToolResults(&'a [Message]),
}

pub(crate) fn segments(messages: &[Message]) -> Vec<Segment<'_>> {
    let mut out = Vec::with_capacity(messages.len());
    let mut i = 0;
    while i < messages.len() {
        if messages[i].role == Role::Tool {
            let end = messages[i..]
                .iter()
                .position(|m| m.role != Role::Tool)
                .map_or(messages.len(), |offset| i + offset);
            out.push(Segment::ToolResults(&messages[i..end]));
            i = end;
        } else {
            out.push(Segment::Message(&messages[i]));
            i += 1;
        }
    }
    out
}

/// The serialized result carried by a tool message (its first text part).
pub(crate) fn tool_result_payload(msg: &Message) -> String {
    msg.content
        .parts()
        .into_iter()
        .find_map(|p| match p {
            ContentPart::Text { text } if !text.trim().is_empty() => Some(text),
            _ => None,
        })
        .unwrap_or_else(|| "{}".to_owned())
}

/// Text parts after the payload, such as pruned-image markers.
pub(crate) fn tool_result_notes(msg: &Message) -> Vec<String> {
    msg.content
        .parts()
        .into_iter()
        .filter_map(|p| match p {
            ContentPart::Text { text } if !text.trim().is_empty() => Some(text),
            _ => None,
        })
        .skip(1)
        .collect()
}

/// Name of the tool that produced a result, falling back to the id.
pub(crate) fn tool_result_name(msg: &Message) -> &str {
    msg.tool_name
        .as_deref()
        .or(msg.tool_call_id.as_deref())
        .unwrap_or("tool")
}

// ---------------------------------------------------------------------------
// Three-way dispatch
// ---------------------------------------------------------------------------

/// Encode tool definitions for `provider`.
pub fn tools_to_wire(provider: Provider, tools: &[ToolDefinition]) -> Value {
    match provider {
        Provider::OpenAi | Provider::Custom => openai::tools_to_wire(tools),
        Provider::Anthropic => anthropic::tools_to_wire(tools),
        Provider::Google => google::tools_to_wire(tools),
    }
}

/// Build the JSON request body. `messages` must already be normalized.
pub fn build_request_body(
    provider: Provider,
    model: &str,
    request: &CompletionRequest,
    messages: &[Message],
) -> Value {
    match provider {
        Provider::OpenAi | Provider::Custom => openai::build_request_body(model, request, messages),
        Provider::Anthropic => anthropic::build_request_body(model, request, messages),
        Provider::Google => google::build_request_body(request, messages),
    }
}

/// Normalize a successful response body.
pub fn parse_response(provider: Provider, body: &Value) -> Result<ParsedResponse> {
    match provider {
        Provider::OpenAi | Provider::Custom => openai::parse_response(provider, body),
        Provider::Anthropic => anthropic::parse_response(body),
        Provider::Google => google::parse_response(body),
    }
}

/// Encode an assistant turn that requests `calls`.
pub fn tool_call_message(provider: Provider, text: &str, calls: &[ToolCall]) -> Value {
    match provider {
        Provider::OpenAi | Provider::Custom => openai::tool_call_message(text, calls),
        Provider::Anthropic => anthropic::tool_call_message(text, calls),
        Provider::Google => google::tool_call_message(text, calls),
    }
}

/// Encode a run of consecutive tool results.
pub fn tool_result_message(provider: Provider, results: &[Message]) -> Vec<Value> {
    match provider {
        Provider::OpenAi | Provider::Custom => openai::tool_result_message(results),
        Provider::Anthropic => anthropic::tool_result_message(results),
        Provider::Google => google::tool_result_message(results),
    }
}

/// Pull a human-readable message out of an error body.
pub fn parse_error_message(provider: Provider, body: &str) -> Option<String> {
    match provider {
        Provider::OpenAi | Provider::Custom => openai::parse_error_message(body),
        Provider::Anthropic => anthropic::parse_error_message(body),
        Provider::Google => google::parse_error_message(body),
    }
}
