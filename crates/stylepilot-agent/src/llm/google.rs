//! Google Gemini `generateContent` wire format.
//!
//! The system prompt becomes `systemInstruction`, the assistant role is
//! called `model`, tools are one `functionDeclarations` array, and images
//! are `inlineData` parts.

use serde_json::{Map, Value, json};

use super::provider::Provider;
use super::tooling::{
    ParsedResponse, Segment, ensure_call_id, normalize_schema, parse_arguments, segments,
    token_count, tool_result_name, tool_result_notes, tool_result_payload,
};
use super::types::{
    CompletionRequest, ContentPart, Message, Role, ToolCall, ToolDefinition, Usage, parse_data_url,
};
use crate::error::Result;

/// Schema keywords the Gemini function-declaration parser rejects.
const UNSUPPORTED_SCHEMA_KEYS: [&str; 3] = ["additionalProperties", "$schema", "default"];

/// Strip unsupported keywords at every nesting level.
fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => {
            let cleaned: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

/// Convert tool definitions into a single `functionDeclarations` entry.
pub fn tools_to_wire(tools: &[ToolDefinition]) -> Value {
    let declarations: Vec<Value> = tools
        .iter()
        .map(|t| {
            let mut decl = json!({"name": t.name});
            if let Some(description) = t.description.as_deref() {
                decl["description"] = json!(description);
            }
            let schema = sanitize_schema(&normalize_schema(&t.parameters));
            let has_properties = schema["properties"]
                .as_object()
                .is_some_and(|props| !props.is_empty());
            if has_properties {
                decl["parameters"] = schema;
            }
            decl
        })
        .collect();
    json!([{"functionDeclarations": declarations}])
}

/// Build a `generateContent` request body. The model lives in the URL.
pub fn build_request_body(request: &CompletionRequest, messages: &[Message]) -> Value {
    let mut system_parts: Vec<Value> = request
        .system
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| json!({"text": s}))
        .collect();
    let mut contents: Vec<Value> = Vec::with_capacity(messages.len());

    for segment in segments(messages) {
        match segment {
            Segment::Message(msg) => match msg.role {
                Role::System => system_parts.push(json!({"text": msg.text()})),
                Role::User => contents.push(json!({
                    "role": "user",
                    "parts": msg.content.parts().iter().map(part_to_wire).collect::<Vec<_>>(),
                })),
                Role::Assistant if !msg.tool_calls.is_empty() => {
                    contents.push(tool_call_message(&msg.text(), &msg.tool_calls));
                }
                Role::Assistant => contents.push(json!({
                    "role": "model",
                    "parts": [{"text": msg.text()}],
                })),
                Role::Tool => contents.extend(tool_result_message(std::slice::from_ref(msg))),
            },
            Segment::ToolResults(results) => contents.extend(tool_result_message(results)),
        }
    }

    let mut body = json!({"contents": contents});

    if !system_parts.is_empty() {
        body["systemInstruction"] = json!({"parts": system_parts});
    }
    if !request.tools.is_empty() {
        body["tools"] = tools_to_wire(&request.tools);
    }

    let mut generation = Map::new();
    if let Some(temperature) = request.temperature {
        generation.insert("temperature".into(), json!(temperature));
    }
    if let Some(max_tokens) = request.max_tokens {
        generation.insert("maxOutputTokens".into(), json!(max_tokens));
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }

    body
}

fn part_to_wire(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({"text": text}),
        ContentPart::Image { url } => image_part(url),
    }
}

fn image_part(url: &str) -> Value {
    match parse_data_url(url) {
        Some(data) => json!({
            "inlineData": {"mimeType": data.media_type, "data": data.data},
        }),
        None => json!({
            "fileData": {"mimeType": guess_image_type(url), "fileUri": url},
        }),
    }
}

fn guess_image_type(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}

/// Encode a `model` turn that requests function calls.
pub fn tool_call_message(text: &str, calls: &[ToolCall]) -> Value {
    let mut parts: Vec<Value> = Vec::with_capacity(calls.len() + 1);
    if !text.trim().is_empty() {
        parts.push(json!({"text": text}));
    }
    for tc in calls {
        parts.push(json!({
            "functionCall": {"name": tc.name, "args": tc.arguments},
        }));
    }
    json!({"role": "model", "parts": parts})
}

/// Function responses must be JSON objects.
fn response_object(payload: &str) -> Value {
    match serde_json::from_str::<Value>(payload) {
        Ok(obj @ Value::Object(_)) => obj,
        Ok(other) => json!({"result": other}),
        Err(_) => json!({"result": payload}),
    }
}

/// Encode a run of tool results as one `user` turn of `functionResponse`
/// parts, followed by any notes and images they carried.
pub fn tool_result_message(results: &[Message]) -> Vec<Value> {
    let mut parts: Vec<Value> = Vec::with_capacity(results.len());
    let mut extras: Vec<Value> = Vec::new();

    for msg in results {
        parts.push(json!({
            "functionResponse": {
                "name": tool_result_name(msg),
                "response": response_object(&tool_result_payload(msg)),
            },
        }));
        extras.extend(
            tool_result_notes(msg)
                .into_iter()
                .map(|note| json!({"text": note})),
        );
        extras.extend(msg.content.images().into_iter().map(image_part));
    }

    if parts.is_empty() {
        return Vec::new();
    }
    parts.extend(extras);
    vec![json!({"role": "user", "parts": parts})]
}

/// Parse a `generateContent` response.
pub fn parse_response(body: &Value) -> Result<ParsedResponse> {
    let candidate = &body["candidates"][0];
    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for part in candidate["content"]["parts"].as_array().into_iter().flatten() {
        // Thinking models interleave their reasoning as flagged text parts.
        if part["thought"].as_bool().unwrap_or(false) {
            continue;
        }
        if let Some(t) = part["text"].as_str() {
            text_parts.push(t);
        }
        let call = &part["functionCall"];
        if let Some(name) = call["name"].as_str().map(str::trim)
            && !name.is_empty()
        {
            tool_calls.push(ToolCall {
                id: ensure_call_id(call["id"].as_str()),
                name: name.to_owned(),
                arguments: parse_arguments(&call["args"]),
            });
        }
    }

    let usage = Usage {
        input_tokens: token_count(&body["usageMetadata"]["promptTokenCount"]),
        output_tokens: token_count(&body["usageMetadata"]["candidatesTokenCount"]),
    };

    let detail = body["promptFeedback"]["blockReason"]
        .as_str()
        .map(|reason| format!("blocked: {reason}"))
        .or_else(|| {
            candidate["finishReason"]
                .as_str()
                .map(|reason| format!("finishReason={reason}"))
        });

    ParsedResponse {
        text: text_parts.join(""),
        tool_calls,
        usage,
    }
    .non_empty(Provider::Google, detail)
}

/// Extract the status and message from a Google API error body.
pub fn parse_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let error = &v["error"];
    let message = error["message"].as_str()?;
    match error["status"].as_str() {
        Some(status) if !status.is_empty() => Some(format!("{status}: {message}")),
        _ => Some(message.to_owned()),
    }
}
