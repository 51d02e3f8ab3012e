//! Anthropic Messages API wire format.
//!
//! The system prompt is a top-level field, only `user` and `assistant`
//! roles exist, tool results travel as `tool_result` blocks inside a user
//! turn, and images are base64 `image` blocks.

use serde_json::{Value, json};

use super::provider::Provider;
use super::tooling::{
    ParsedResponse, Segment, ensure_call_id, normalize_schema, parse_arguments, segments,
    token_count, tool_result_notes, tool_result_payload,
};
use super::types::{
    CompletionRequest, ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition, Usage,
    parse_data_url,
};
use crate::error::Result;

/// `max_tokens` is mandatory for this API.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Convert tool definitions into the Anthropic API format.
pub fn tools_to_wire(tools: &[ToolDefinition]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            let mut tool = json!({
                "name": t.name,
                "input_schema": normalize_schema(&t.parameters),
            });
            if let Some(description) = t.description.as_deref() {
                tool["description"] = json!(description);
            }
            tool
        })
        .collect();
    json!(tool_values)
}

/// Build a `/v1/messages` request body.
pub fn build_request_body(model: &str, request: &CompletionRequest, messages: &[Message]) -> Value {
    let mut system_parts: Vec<String> = request
        .system
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect();
    let mut wire: Vec<Value> = Vec::with_capacity(messages.len());

    for segment in segments(messages) {
        match segment {
            Segment::Message(msg) => match msg.role {
                Role::System => system_parts.push(msg.text()),
                Role::User => wire.push(json!({
                    "role": "user",
                    "content": content_to_wire(&msg.content),
                })),
                Role::Assistant if !msg.tool_calls.is_empty() => {
                    wire.push(tool_call_message(&msg.text(), &msg.tool_calls));
                }
                Role::Assistant => wire.push(json!({
                    "role": "assistant",
                    "content": msg.text(),
                })),
                Role::Tool => wire.extend(tool_result_message(std::slice::from_ref(msg))),
            },
            Segment::ToolResults(results) => wire.extend(tool_result_message(results)),
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": wire,
    });

    if !system_parts.is_empty() {
        body["system"] = json!(system_parts.join("\n\n"));
    }
    if !request.tools.is_empty() {
        body["tools"] = tools_to_wire(&request.tools);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    body
}

fn content_to_wire(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => json!(parts.iter().map(part_to_block).collect::<Vec<_>>()),
    }
}

fn part_to_block(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({"type": "text", "text": text}),
        ContentPart::Image { url } => image_block(url),
    }
}

fn image_block(url: &str) -> Value {
    match parse_data_url(url) {
        Some(data) => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": data.media_type,
                "data": data.data,
            },
        }),
        None => json!({
            "type": "image",
            "source": {"type": "url", "url": url},
        }),
    }
}

/// Encode an assistant turn that requests tool calls.
pub fn tool_call_message(text: &str, calls: &[ToolCall]) -> Value {
    let mut content: Vec<Value> = Vec::with_capacity(calls.len() + 1);
    if !text.trim().is_empty() {
        content.push(json!({"type": "text", "text": text}));
    }
    for tc in calls {
        content.push(json!({
            "type": "tool_use",
            "id": tc.id,
            "name": tc.name,
            "input": tc.arguments,
        }));
    }
    json!({
        "role": "assistant",
        "content": content,
    })
}

/// Encode a run of tool results as a single user turn.
///
/// Consecutive user turns are rejected by the API, so every result of one
/// assistant turn must share a message.
pub fn tool_result_message(results: &[Message]) -> Vec<Value> {
    let blocks: Vec<Value> = results
        .iter()
        .map(|msg| {
            let mut content = vec![json!({"type": "text", "text": tool_result_payload(msg)})];
            content.extend(
                tool_result_notes(msg)
                    .into_iter()
                    .map(|note| json!({"type": "text", "text": note})),
            );
            content.extend(msg.content.images().into_iter().map(image_block));
            json!({
                "type": "tool_result",
                "tool_use_id": msg.tool_call_id.as_deref().unwrap_or_default(),
                "content": content,
            })
        })
        .collect();

    if blocks.is_empty() {
        return Vec::new();
    }
    vec![json!({"role": "user", "content": blocks})]
}

/// Parse a non-streaming Messages API response.
pub fn parse_response(body: &Value) -> Result<ParsedResponse> {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in body["content"].as_array().into_iter().flatten() {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t);
                }
            }
            Some("tool_use") => {
                let name = block["name"].as_str().unwrap_or_default().trim();
                if name.is_empty() {
                    continue;
                }
                tool_calls.push(ToolCall {
                    id: ensure_call_id(block["id"].as_str()),
                    name: name.to_owned(),
                    arguments: parse_arguments(&block["input"]),
                });
            }
            _ => {}
        }
    }

    let usage = Usage {
        input_tokens: token_count(&body["usage"]["input_tokens"]),
        output_tokens: token_count(&body["usage"]["output_tokens"]),
    };

    let detail = body["stop_reason"]
        .as_str()
        .map(|reason| format!("stop_reason={reason}"));

    ParsedResponse {
        text: text_parts.join(""),
        tool_calls,
        usage,
    }
    .non_empty(Provider::Anthropic, detail)
}

/// Extract the error type and message from an Anthropic error body.
pub fn parse_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let error = &v["error"];
    let message = error["message"].as_str()?;
    match error["type"].as_str() {
        Some(kind) if !kind.is_empty() => Some(format!("{kind}: {message}")),
        _ => Some(message.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::llm::provider::{Credential, ProviderConfig};

    fn request(messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest::new(
            ProviderConfig::new(Provider::Anthropic, "", Credential::api_key("k")),
            messages,
        )
    }

    #[test]
    fn system_is_lifted_out_of_messages() {
        let req = request(vec![Message::system("House rules"), Message::user("Hello")])
            .with_system("You write CSS");
        let body = build_request_body("claude-sonnet-4-20250514", &req, &req.messages);

        assert_eq!(body["system"], "You write CSS\n\nHouse rules");
        assert_eq!(body["max_tokens"], 4096);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn data_url_images_become_base64_sources() {
        let req = request(vec![Message::user_with_image(
            "Look",
            "data:image/jpeg;base64,/9j/AA==",
        )]);
        let body = build_request_body("m", &req, &req.messages);
        let image = &body["messages"][0]["content"][1];
        assert_eq!(image["type"], "image");
        assert_eq!(image["source"]["type"], "base64");
        assert_eq!(image["source"]["media_type"], "image/jpeg");
        assert_eq!(image["source"]["data"], "/9j/AA==");

        let remote = image_block("https://example.com/shot.png");
        assert_eq!(remote["source"]["type"], "url");
    }

    #[test]
    fn tool_results_merge_into_one_user_turn() {
        let call = |id: &str| ToolCall {
            id: id.into(),
            name: "inspect".into(),
            arguments: json!({"selector": "a"}),
        };
        let req = request(vec![
            Message::user("Style it"),
            Message::assistant_tool_calls("Checking", vec![call("t1"), call("t2")]),
            Message::tool_result("t1", "inspect", r#"{"count":2}"#),
            Message::tool_result_with_image(
                "t2",
                "apply_css",
                r#"{"applied":true}"#,
                "data:image/png;base64,AAAA",
            ),
        ]);
        let body = build_request_body("m", &req, &req.messages);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);

        let assistant = &messages[1];
        assert_eq!(assistant["content"][0]["type"], "text");
        assert_eq!(assistant["content"][1]["type"], "tool_use");
        assert_eq!(assistant["content"][1]["input"]["selector"], "a");

        let results = messages[2]["content"].as_array().unwrap();
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "t1");
        assert_eq!(results[1]["content"][1]["type"], "image");
    }

    #[test]
    fn parse_text_and_tool_use() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Applying"},
                {"type": "tool_use", "id": "toolu_1", "name": "apply_css", "input": {"css": "a{}"}},
                {"type": "tool_use", "name": "get_color_palette", "input": "garbage"}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 30, "output_tokens": 9}
        });
        let parsed = parse_response(&body).unwrap();
        assert_eq!(parsed.text, "Applying");
        assert_eq!(parsed.tool_calls[0].id, "toolu_1");
        assert_eq!(parsed.tool_calls[1].arguments, json!({}));
        assert!(parsed.tool_calls[1].id.starts_with("call_"));
        assert_eq!(parsed.usage.input_tokens, 30);
    }

    #[test]
    fn empty_content_is_empty_response() {
        let body = json!({"content": [], "stop_reason": "max_tokens"});
        assert!(matches!(
            parse_response(&body),
            Err(AgentError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn error_message_includes_type() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(
            parse_error_message(body).as_deref(),
            Some("overloaded_error: Overloaded")
        );
    }
}
