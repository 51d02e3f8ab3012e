//! Shared fixtures for the agent integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use stylepilot_agent::config::Settings;
use stylepilot_agent::tools::contrast_tool_output;
use stylepilot_agent::{
    AgentError, ContextMonitor, Provider, Result, SessionContext, ToolExecutor, ToolOutput,
};
use stylepilot_store::{MemoryStateStore, StateStore, StoreResult};
use wiremock::{Request, Respond, ResponseTemplate};

pub const SCREENSHOT: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUg==";

// ═══════════════════════════════════════════════════════════════════════
//  Scripted provider responses
// ═══════════════════════════════════════════════════════════════════════

/// Replays a fixed list of responses; the last one repeats forever.
pub struct Scripted {
    responses: Vec<(u16, Value)>,
    next: AtomicUsize,
}

impl Scripted {
    pub fn new(responses: Vec<Value>) -> Self {
        Self::with_status(responses.into_iter().map(|r| (200, r)).collect())
    }

    pub fn with_status(responses: Vec<(u16, Value)>) -> Self {
        assert!(!responses.is_empty());
        Self {
            responses,
            next: AtomicUsize::new(0),
        }
    }
}

impl Respond for Scripted {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        let (status, body) = &self.responses[i.min(self.responses.len() - 1)];
        ResponseTemplate::new(*status).set_body_json(body.clone())
    }
}

pub fn openai_text(text: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })
}

pub fn openai_tool_calls(calls: &[(&str, &str, Value)]) -> Value {
    let tool_calls: Vec<Value> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": args.to_string()}
            })
        })
        .collect();
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": null, "tool_calls": tool_calls},
            "finish_reason": "tool_calls"
        }]
    })
}

/// Request bodies the mock server has seen, in order.
pub async fn request_bodies(server: &wiremock::MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
//  Collaborators
// ═══════════════════════════════════════════════════════════════════════

/// Fake page: records every call and answers like a browser-side executor.
#[derive(Default)]
pub struct RecordingExecutor {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub fail_tool: Option<&'static str>,
}

impl RecordingExecutor {
    pub fn failing(tool: &'static str) -> Self {
        Self {
            fail_tool: Some(tool),
            ..Self::default()
        }
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(&self, tool_name: &str, arguments: &Value) -> Result<ToolOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((tool_name.to_owned(), arguments.clone()));

        if self.fail_tool == Some(tool_name) {
            return Err(AgentError::ToolExecutionFailed {
                tool_name: tool_name.to_owned(),
                reason: "page is not responding".into(),
            });
        }

        match tool_name {
            "inspect" => Ok(ToolOutput::new(json!({
                "matches": [{"tag": "h1", "color": "rgb(0, 0, 0)", "font": "Georgia"}]
            }))),
            "apply_css" => Ok(ToolOutput::with_image(json!({"applied": true}), SCREENSHOT)),
            "get_color_palette" => Ok(ToolOutput::new(json!({"text": ["#111"], "background": ["#fff"]}))),
            "check_contrast" => contrast_tool_output(arguments),
            "scroll_and_capture" => Ok(ToolOutput::with_image(json!({"scrolled": true}), SCREENSHOT)),
            other => panic!("executor received unexpected tool {other}"),
        }
    }
}

/// Reports `identities[i]` on the i-th check; the last one repeats.
pub struct ScriptedContext {
    identities: Vec<String>,
    next: AtomicUsize,
}

impl ScriptedContext {
    pub fn new(identities: &[&str]) -> Self {
        Self {
            identities: identities.iter().map(|s| (*s).to_owned()).collect(),
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContextMonitor for ScriptedContext {
    async fn current_identity(&self) -> Result<String> {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(self.identities[i.min(self.identities.len() - 1)].clone())
    }
}

/// A memory store that keeps a copy of every value written.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStateStore,
    pub writes: Mutex<Vec<Value>>,
}

#[async_trait]
impl StateStore for RecordingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.writes.lock().unwrap().push(value.clone());
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        self.inner.remove(key).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Builders
// ═══════════════════════════════════════════════════════════════════════

/// Settings that route every request to an OpenAI-compatible mock.
pub fn settings_for(base_url: &str) -> Settings {
    let mut settings = Settings::default();
    settings.default_provider = Provider::Custom;
    settings.custom.base_url = Some(base_url.to_owned());
    settings.custom.model = Some("test-model".into());
    settings
}

pub fn session() -> SessionContext {
    SessionContext {
        target: "https://example.com/blog".into(),
        identity_token: "doc-1".into(),
        instructions: "Make it a calm dark theme".into(),
        document_summary: "<header>, <main> with 3 <article>, <footer>".into(),
        initial_snapshot: Some(SCREENSHOT.into()),
    }
}

/// Number of image parts in a serialized message list.
pub fn count_images(messages: &Value) -> usize {
    messages
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|m| m["content"].as_array())
        .flatten()
        .filter(|part| part["type"] == "image")
        .count()
}
