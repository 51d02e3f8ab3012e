//! Core types for LLM interaction.
//!
//! These types are provider-agnostic. The vendor modules
//! ([`super::openai`], [`super::anthropic`], [`super::google`]) translate
//! them into wire formats and back.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{Provider, ProviderConfig};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human user (or the host on their behalf).
    User,
    /// Output from the LLM.
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

/// One typed piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text { text: String },
    /// An inline image, normally a base64 `data:` URL.
    Image { url: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// An image part from a `data:` URL (or any URL the vendor accepts).
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }

    fn is_blank(&self) -> bool {
        match self {
            Self::Text { text } => text.trim().is_empty(),
            Self::Image { url } => url.is_empty(),
        }
    }
}

/// Message content: either a bare string or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl MessageContent {
    /// The content as an ordered list of parts.
    pub fn parts(&self) -> Vec<ContentPart> {
        match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![ContentPart::text(text.clone())],
            Self::Parts(parts) => parts.clone(),
        }
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// URLs of all image parts, in order.
    pub fn images(&self) -> Vec<&str> {
        match self {
            Self::Text(_) => Vec::new(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Image { url } => Some(url.as_str()),
                    ContentPart::Text { .. } => None,
                })
                .collect(),
        }
    }

    /// True when nothing survives normalization.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Parts(parts) => parts.iter().all(ContentPart::is_blank),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// Text or typed parts. For [`Role::Tool`] messages the first text part
    /// holds the serialized tool result.
    #[serde(default)]
    pub content: MessageContent,

    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// The call this message answers (only for [`Role::Tool`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Name of the tool that produced this result. Google's wire format
    /// keys function responses by name rather than by call id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(content.into()))
    }

    /// Create a user text message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(content.into()))
    }

    /// Create a user message from explicit parts.
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::new(Role::User, MessageContent::Parts(parts))
    }

    /// Create a user message carrying text followed by one image.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self::user_parts(vec![ContentPart::text(text), ContentPart::image(image_url)])
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(content.into()))
    }

    /// Create an assistant message that requests tool calls, optionally
    /// with the text that accompanied them.
    pub fn assistant_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, MessageContent::Text(text.into()))
        }
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::new(Role::Tool, MessageContent::Text(content.into()))
        }
    }

    /// Create a tool result message with an attached image. The image is
    /// kept as its own part so it can be pruned without touching the result.
    pub fn tool_result_with_image(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::new(
                Role::Tool,
                MessageContent::Parts(vec![
                    ContentPart::text(content),
                    ContentPart::image(image_url),
                ]),
            )
        }
    }

    /// The text content of the message.
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// Drop empty parts and empty messages before anything is sent.
///
/// Assistant messages survive when they carry tool calls, and tool results
/// are never dropped (the vendors require every call to be answered); an
/// empty tool result becomes `{}`.
pub fn normalize_messages(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter_map(|msg| {
            let mut msg = msg.clone();
            if let MessageContent::Parts(parts) = &mut msg.content {
                parts.retain(|p| !p.is_blank());
            }

            if !msg.content.is_blank() || !msg.tool_calls.is_empty() {
                return Some(msg);
            }
            if msg.role == Role::Tool {
                msg.content = MessageContent::Text("{}".into());
                return Some(msg);
            }
            None
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Data URLs
// ---------------------------------------------------------------------------

/// A decoded `data:` URL: media type plus base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub media_type: String,
    pub data: String,
}

/// Split a `data:` URL into media type and base64 data.
///
/// Non-base64 payloads are base64-encoded so every vendor receives the same
/// representation. Returns `None` for anything that is not a data URL.
pub fn parse_data_url(url: &str) -> Option<DataUrl> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;

    let (meta, is_base64) = match meta.strip_suffix(";base64") {
        Some(m) => (m, true),
        None => (meta, false),
    };
    let media_type = meta.split(';').next().unwrap_or_default().trim();
    let media_type = if media_type.is_empty() {
        "application/octet-stream"
    } else {
        media_type
    };

    let data = if is_base64 {
        payload.trim().to_owned()
    } else {
        STANDARD.encode(payload.as_bytes())
    };

    Some(DataUrl {
        media_type: media_type.to_owned(),
        data,
    })
}

/// Build a base64 `data:` URL.
pub fn to_data_url(media_type: &str, base64_data: &str) -> String {
    format!("data:{media_type};base64,{base64_data}")
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// A tool exposed to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique, non-empty tool name.
    pub name: String,

    /// What the tool does, in terms the model can act on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            parameters,
        }
    }
}

/// A tool invocation parsed out of a provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the call with its result; generated when the vendor
    /// omits one.
    pub id: String,

    /// The tool to invoke.
    pub name: String,

    /// Arguments as a JSON object (`{}` when the model sent garbage).
    pub arguments: Value,
}

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A provider-agnostic completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Which provider to call, with which model and credential.
    pub provider: ProviderConfig,

    /// The conversation history.
    pub messages: Vec<Message>,

    /// System prompt, placed wherever the vendor expects it.
    pub system: Option<String>,

    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,

    /// Sampling temperature.
    pub temperature: Option<f64>,

    /// Maximum tokens the model may generate.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(provider: ProviderConfig, messages: Vec<Message>) -> Self {
        Self {
            provider,
            messages,
            system: None,
            tools: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The normalized result of one completion call.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub provider: Provider,
    pub model: String,
    /// Concatenated text output (may be empty when tool calls are present).
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
    /// The untouched response body.
    pub raw: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_base64_data_url() {
        let parsed = parse_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(parsed.media_type, "image/png");
        assert_eq!(parsed.data, "iVBORw0KGgo=");
    }

    #[test]
    fn parse_plain_data_url_is_reencoded() {
        let parsed = parse_data_url("data:image/svg+xml;utf8,<svg/>").unwrap();
        assert_eq!(parsed.media_type, "image/svg+xml");
        assert_eq!(parsed.data, STANDARD.encode("<svg/>"));
    }

    #[test]
    fn plain_data_url_rebuilds_as_base64() {
        let parsed = parse_data_url("data:image/svg+xml,<svg/>").unwrap();
        assert_eq!(
            to_data_url(&parsed.media_type, &parsed.data),
            format!("data:image/svg+xml;base64,{}", STANDARD.encode("<svg/>"))
        );
    }

    #[test]
    fn non_data_url_is_rejected() {
        assert!(parse_data_url("https://example.com/a.png").is_none());
        assert!(parse_data_url("data:image/png;base64").is_none());
    }

    #[test]
    fn normalize_drops_blank_messages_and_parts() {
        let messages = vec![
            Message::user("   "),
            Message::user_parts(vec![ContentPart::text(""), ContentPart::text("kept")]),
            Message::assistant(""),
            Message::assistant_tool_calls(
                "",
                vec![ToolCall {
                    id: "c1".into(),
                    name: "inspect".into(),
                    arguments: serde_json::json!({}),
                }],
            ),
            Message::tool_result("c1", "inspect", ""),
        ];

        let normalized = normalize_messages(&messages);
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].content.parts().len(), 1);
        assert_eq!(normalized[0].text(), "kept");
        assert_eq!(normalized[1].tool_calls.len(), 1);
        assert_eq!(normalized[2].text(), "{}");
    }

    #[test]
    fn content_serializes_untagged() {
        let msg = Message::user_with_image("look", "data:image/png;base64,AAAA");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);

        let plain: Message =
            serde_json::from_value(serde_json::json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(plain.content, MessageContent::Text("hi".into()));
    }
}
