//! OpenAI Chat Completions wire format.
//!
//! Also used for user-supplied OpenAI-compatible endpoints. System prompts
//! ride in the flat `messages` array, tools are wrapped as
//! `{type: function, function: {...}}`, and images are `image_url` parts.

use serde_json::{Value, json};

use super::provider::Provider;
use super::tooling::{
    ParsedResponse, Segment, ensure_call_id, normalize_schema, parse_arguments, segments,
    token_count, tool_result_notes, tool_result_payload,
};
use super::types::{
    CompletionRequest, ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition, Usage,
};
use crate::error::{AgentError, Result};

/// Text that introduces images deferred out of `role: tool` messages.
const DEFERRED_IMAGE_NOTE: &str = "Screenshot attached to the tool result above.";

/// Reasoning model families reject `temperature` and `max_tokens`.
fn is_reasoning_model(model: &str) -> bool {
    let name = model.rsplit('/').next().unwrap_or(model).to_ascii_lowercase();
    ["o1", "o3", "o4", "gpt-5"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Convert tool definitions into the OpenAI function-calling format.
pub fn tools_to_wire(tools: &[ToolDefinition]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description.as_deref().unwrap_or_default(),
                    "parameters": normalize_schema(&t.parameters),
                },
            })
        })
        .collect();
    json!(tool_values)
}

/// Build a `/chat/completions` request body.
pub fn build_request_body(model: &str, request: &CompletionRequest, messages: &[Message]) -> Value {
    let mut wire: Vec<Value> = Vec::with_capacity(messages.len() + 1);

    if let Some(system) = request.system.as_deref().filter(|s| !s.trim().is_empty()) {
        wire.push(json!({"role": "system", "content": system}));
    }

    for segment in segments(messages) {
        match segment {
            Segment::Message(msg) => wire.push(message_to_wire(msg)),
            Segment::ToolResults(results) => wire.extend(tool_result_message(results)),
        }
    }

    let mut body = json!({
        "model": model,
        "messages": wire,
    });

    if !request.tools.is_empty() {
        body["tools"] = tools_to_wire(&request.tools);
    }

    let reasoning = is_reasoning_model(model);
    if let Some(temperature) = request.temperature
        && !reasoning
    {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        let key = if reasoning {
            "max_completion_tokens"
        } else {
            "max_tokens"
        };
        body[key] = json!(max_tokens);
    }

    body
}

fn message_to_wire(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({"role": "system", "content": msg.text()}),
        Role::User => json!({"role": "user", "content": content_to_wire(&msg.content)}),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            tool_call_message(&msg.text(), &msg.tool_calls)
        }
        Role::Assistant => json!({"role": "assistant", "content": msg.text()}),
        Role::Tool => tool_message(msg),
    }
}

fn content_to_wire(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => {
            let parts: Vec<Value> = parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => json!({"type": "text", "text": text}),
                    ContentPart::Image { url } => image_part(url),
                })
                .collect();
            json!(parts)
        }
    }
}

fn image_part(url: &str) -> Value {
    json!({"type": "image_url", "image_url": {"url": url}})
}

/// Encode an assistant turn that requests tool calls.
pub fn tool_call_message(text: &str, calls: &[ToolCall]) -> Value {
    let tool_calls: Vec<Value> = calls
        .iter()
        .map(|tc| {
            json!({
                "id": tc.id,
                "type": "function",
                "function": {
                    "name": tc.name,
                    "arguments": tc.arguments.to_string(),
                },
            })
        })
        .collect();

    let content = if text.trim().is_empty() {
        Value::Null
    } else {
        json!(text)
    };

    json!({
        "role": "assistant",
        "content": content,
        "tool_calls": tool_calls,
    })
}

fn tool_message(msg: &Message) -> Value {
    let mut content = tool_result_payload(msg);
    for note in tool_result_notes(msg) {
        content.push('\n');
        content.push_str(&note);
    }
    json!({
        "role": "tool",
        "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
        "content": content,
    })
}

/// Encode a run of tool results.
///
/// `role: tool` messages only carry text, so any images are collected into
/// one `user` message placed after the whole run.
pub fn tool_result_message(results: &[Message]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(results.len() + 1);
    let mut images: Vec<Value> = Vec::new();

    for msg in results {
        out.push(tool_message(msg));
        images.extend(msg.content.images().into_iter().map(image_part));
    }

    if !images.is_empty() {
        let mut parts = vec![json!({"type": "text", "text": DEFERRED_IMAGE_NOTE})];
        parts.extend(images);
        out.push(json!({"role": "user", "content": parts}));
    }

    out
}

/// Parse a non-streaming Chat Completions response.
pub fn parse_response(provider: Provider, body: &Value) -> Result<ParsedResponse> {
    // Some compatible servers report failures with a 200 status.
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error["message"]
            .as_str()
            .or_else(|| error.as_str())
            .unwrap_or("unknown error")
            .to_owned();
        return Err(AgentError::Provider {
            provider: provider.to_string(),
            status: None,
            message,
        });
    }

    let choice = &body["choices"][0];
    let message = &choice["message"];

    let text = match &message["content"] {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|tc| {
            let function = &tc["function"];
            let name = function["name"].as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(ToolCall {
                id: ensure_call_id(tc["id"].as_str()),
                name: name.to_owned(),
                arguments: parse_arguments(&function["arguments"]),
            })
        })
        .collect();

    let usage = Usage {
        input_tokens: token_count(&body["usage"]["prompt_tokens"]),
        output_tokens: token_count(&body["usage"]["completion_tokens"]),
    };

    let detail = if choice.is_null() {
        Some("no choices in response".to_owned())
    } else {
        choice["finish_reason"]
            .as_str()
            .map(|reason| format!("finish_reason={reason}"))
    };

    ParsedResponse {
        text,
        tool_calls,
        usage,
    }
    .non_empty(provider, detail)
}

/// Extract `error.message` from an OpenAI error body.
pub fn parse_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let error = &v["error"];
    let message = error["message"].as_str().or_else(|| error.as_str())?;
    match error["code"].as_str() {
        Some(code) if !code.is_empty() => Some(format!("{message} ({code})")),
        _ => Some(message.to_owned()),
    }
}
