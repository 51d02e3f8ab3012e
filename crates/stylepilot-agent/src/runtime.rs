//! The styling agent loop.
//!
//! Drives a bounded, tool-using conversation to a final stylesheet. Each
//! turn re-checks the target context, calls the provider with the full
//! history, runs any requested tools in order, prunes old screenshots and
//! checkpoints. A run that is killed between turns resumes from the last
//! checkpoint on the next invocation with the same session key.
//!
//! ```text
//! Start ─┬─ ResumeFromCheckpoint ─┐
//!        └─ FreshStart ───────────┴─▶ TurnLoop ─┬─▶ Done
//!                                               └─▶ Aborted
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::checkpoint::{AgentCheckpoint, CheckpointStore, prune_images};
use crate::config::Settings;
use crate::css::extract_css;
use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::llm::provider::{Provider, ProviderConfig};
use crate::llm::tooling::required_arguments_missing;
use crate::llm::types::{
    CompletionRequest, Message, ToolCall, ToolDefinition, parse_data_url, to_data_url,
};
use crate::prompt;
use crate::tools::{self, APPLY_CSS, ContextMonitor, ToolExecutor};

/// Error text reported when the turn budget runs out before any CSS was
/// applied.
pub const EXHAUSTED_WITHOUT_CSS: &str = "exhausted without CSS";

// ---------------------------------------------------------------------------
// Caller-facing types
// ---------------------------------------------------------------------------

/// The document a run is styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Stable identifier of the target document (e.g. its URL).
    pub target: String,
    /// Changes whenever the document is reloaded or navigated.
    pub identity_token: String,
    /// What the user asked for.
    pub instructions: String,
    /// Short structural summary of the document.
    pub document_summary: String,
    /// Screenshot taken before the run, as a `data:` URL.
    pub initial_snapshot: Option<String>,
}

impl SessionContext {
    /// Binds checkpoints to one document load.
    pub fn session_key(&self) -> String {
        format!("{}#{}", self.target, self.identity_token)
    }
}

/// Passed to the progress observer before every provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnProgress {
    /// 1-based index of the turn about to run.
    pub turn: u32,
    pub max_turns: u32,
}

/// Progress observer. An `Err` is logged and otherwise ignored.
pub type ProgressCallback = Arc<dyn Fn(TurnProgress) -> Result<(), String> + Send + Sync>;

/// Per-run overrides; anything left unset falls back to [`Settings`].
#[derive(Clone, Default)]
pub struct AgentOptions {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub max_turns: Option<u32>,
    pub on_progress: Option<ProgressCallback>,
}

impl AgentOptions {
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(TurnProgress) -> Result<(), String> + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentOptions")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_turns", &self.max_turns)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// The result of one run. `error` is set whenever the run did not end with
/// a clean final answer; `css` still carries the best stylesheet produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
    pub css: Option<String>,
    pub turns_used: u32,
    pub provider: Provider,
    pub model: String,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Loop state
// ---------------------------------------------------------------------------

/// In-flight state, threaded through each turn and persisted after it.
#[derive(Debug)]
struct RunState {
    /// Turns completed so far.
    turn_number: u32,
    messages: Vec<Message>,
    current_css: Option<String>,
}

impl RunState {
    fn fresh(session: &SessionContext) -> Self {
        Self {
            turn_number: 0,
            messages: vec![prompt::initial_user_message(session)],
            current_css: None,
        }
    }

    fn resumed(checkpoint: AgentCheckpoint) -> Self {
        Self {
            turn_number: checkpoint.turn_number,
            messages: checkpoint.messages,
            current_css: checkpoint.current_css,
        }
    }

    fn checkpoint(&self, session_key: &str) -> AgentCheckpoint {
        AgentCheckpoint::new(
            self.turn_number,
            self.messages.clone(),
            self.current_css.clone(),
            session_key,
        )
    }
}

/// What one turn decided.
enum Step {
    Continue(RunState),
    Finish {
        css: Option<String>,
        error: Option<String>,
        turns_used: u32,
    },
}

/// Everything fixed for the duration of one run.
struct RunPlan<'a> {
    session: &'a SessionContext,
    session_key: String,
    provider: ProviderConfig,
    system_prompt: String,
    temperature: f64,
    max_tokens: u32,
    max_turns: u32,
    on_progress: Option<&'a ProgressCallback>,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs styling sessions against the configured providers.
pub struct AgentRunner {
    llm: Arc<LlmClient>,
    settings: Settings,
    checkpoints: CheckpointStore,
    tools: Vec<ToolDefinition>,
}

impl AgentRunner {
    /// A max age already set on `checkpoints` takes precedence over
    /// `agent.checkpoint_max_age_secs`.
    pub fn new(llm: Arc<LlmClient>, settings: Settings, checkpoints: CheckpointStore) -> Self {
        let checkpoints = checkpoints.or_max_age(settings.agent.checkpoint_max_age());
        Self {
            llm,
            settings,
            checkpoints,
            tools: tools::tool_definitions(),
        }
    }

    /// Run the loop to completion. Never fails: every problem is reported
    /// through [`AgentOutcome::error`] alongside any CSS already produced.
    pub async fn run(
        &self,
        session: &SessionContext,
        options: &AgentOptions,
        executor: &dyn ToolExecutor,
        monitor: &dyn ContextMonitor,
    ) -> AgentOutcome {
        let provider = options.provider.unwrap_or(self.settings.default_provider);
        let provider_config = self
            .settings
            .provider_config(provider, options.model.as_deref());
        let session_key = session.session_key();

        let model = match provider_config.resolve() {
            Ok(endpoint) => endpoint.model,
            Err(e) => {
                warn!(%provider, error = %e, "agent run not started");
                self.checkpoints.clear(&session_key).await;
                return AgentOutcome {
                    css: None,
                    turns_used: 0,
                    provider,
                    model: provider_config.model,
                    error: Some(e.to_string()),
                };
            }
        };

        let plan = RunPlan {
            session,
            session_key,
            provider: provider_config,
            system_prompt: prompt::system_prompt(),
            temperature: options.temperature.unwrap_or(self.settings.agent.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.settings.agent.max_tokens),
            max_turns: options
                .max_turns
                .unwrap_or(self.settings.agent.max_turns)
                .max(1),
            on_progress: options.on_progress.as_ref(),
        };

        let mut state = match self
            .checkpoints
            .load(&plan.session_key)
            .await
        {
            Some(checkpoint) => {
                info!(
                    session_key = %plan.session_key,
                    turn = checkpoint.turn_number,
                    "resuming agent run from checkpoint"
                );
                RunState::resumed(checkpoint)
            }
            None => RunState::fresh(session),
        };

        info!(
            session_key = %plan.session_key,
            %provider,
            %model,
            max_turns = plan.max_turns,
            start_turn = state.turn_number + 1,
            "agent run started"
        );

        let (css, error, turns_used) = loop {
            if state.turn_number >= plan.max_turns {
                let error = match state.current_css {
                    Some(_) => format!("turn budget of {} exhausted", plan.max_turns),
                    None => EXHAUSTED_WITHOUT_CSS.to_owned(),
                };
                info!(session_key = %plan.session_key, turns = state.turn_number, "turn budget exhausted");
                break (state.current_css, Some(error), state.turn_number);
            }

            match self.turn(&plan, state, executor, monitor).await {
                Step::Continue(next) => state = next,
                Step::Finish {
                    css,
                    error,
                    turns_used,
                } => break (css, error, turns_used),
            }
        };

        self.checkpoints.clear(&plan.session_key).await;

        info!(
            session_key = %plan.session_key,
            turns_used,
            has_css = css.is_some(),
            error = error.as_deref().unwrap_or(""),
            "agent run finished"
        );

        AgentOutcome {
            css,
            turns_used,
            provider,
            model,
            error,
        }
    }

    /// Run one turn. The turn number in `state` counts completed turns.
    async fn turn(
        &self,
        plan: &RunPlan<'_>,
        mut state: RunState,
        executor: &dyn ToolExecutor,
        monitor: &dyn ContextMonitor,
    ) -> Step {
        let turn = state.turn_number + 1;

        // 1. The document must still be the one the run started on.
        let identity = monitor.current_identity().await;
        let changed = match &identity {
            Ok(current) => *current != plan.session.identity_token,
            Err(_) => true,
        };
        if changed {
            let error = match identity {
                Ok(_) => AgentError::AbortedByContextChange.to_string(),
                Err(e) => format!("could not verify target context: {e}"),
            };
            info!(session_key = %plan.session_key, turn, %error, "agent run aborted");
            return Step::Finish {
                css: state.current_css,
                error: Some(error),
                turns_used: state.turn_number,
            };
        }

        if let Some(callback) = plan.on_progress
            && let Err(e) = callback(TurnProgress {
                turn,
                max_turns: plan.max_turns,
            })
        {
            debug!(turn, error = %e, "progress observer failed");
        }

        // 2. Ask the model.
        let request = CompletionRequest::new(plan.provider.clone(), state.messages)
            .with_system(plan.system_prompt.as_str())
            .with_tools(self.tools.clone())
            .with_temperature(Some(plan.temperature))
            .with_max_tokens(Some(plan.max_tokens));
        let outcome = self.llm.complete(&request).await;
        state.messages = request.messages;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(session_key = %plan.session_key, turn, error = %e, "provider call failed");
                return Step::Finish {
                    css: state.current_css,
                    error: Some(e.to_string()),
                    turns_used: turn,
                };
            }
        };
        state.turn_number = turn;

        // 3. No tool calls: this is the final answer.
        if result.tool_calls.is_empty() {
            state.messages.push(Message::assistant(result.text.as_str()));
            let css = extract_css(&result.text).or_else(|| state.current_css.clone());
            self.checkpoints
                .save(&state.checkpoint(&plan.session_key))
                .await;
            let error = css
                .is_none()
                .then(|| "final answer contained no CSS".to_owned());
            info!(session_key = %plan.session_key, turn, "final answer received");
            return Step::Finish {
                css,
                error,
                turns_used: turn,
            };
        }

        // 4. Run the tools in request order, then prune and checkpoint.
        info!(
            turn,
            tools = ?result.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "model requested tool calls"
        );
        state.messages.push(Message::assistant_tool_calls(
            result.text,
            result.tool_calls.clone(),
        ));
        for call in &result.tool_calls {
            let message = self.execute_call(call, executor, &mut state).await;
            state.messages.push(message);
        }

        let pruned = prune_images(&mut state.messages);
        if pruned > 0 {
            debug!(turn, pruned, "pruned stale screenshots");
        }
        self.checkpoints
            .save(&state.checkpoint(&plan.session_key))
            .await;

        Step::Continue(state)
    }

    /// Execute one tool call and turn its outcome into a tool-result message.
    async fn execute_call(
        &self,
        call: &ToolCall,
        executor: &dyn ToolExecutor,
        state: &mut RunState,
    ) -> Message {
        let Some(definition) = self.tools.iter().find(|t| t.name == call.name) else {
            warn!(tool = %call.name, "model called an unknown tool");
            return error_result(call, format!("unknown tool `{}`", call.name));
        };

        let missing = required_arguments_missing(definition, &call.arguments);
        if !missing.is_empty() {
            debug!(tool = %call.name, ?missing, "tool call missing required arguments");
            return error_result(
                call,
                format!("missing required argument(s): {}", missing.join(", ")),
            );
        }

        debug!(tool = %call.name, id = %call.id, "executing tool");
        let output = match executor.execute(&call.name, &call.arguments).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                return error_result(call, e.to_string());
            }
        };

        if call.name == APPLY_CSS
            && let Some(css) = call.arguments["css"].as_str().map(str::trim)
            && !css.is_empty()
        {
            state.current_css = Some(css.to_owned());
        }

        let payload = output.result.to_string();
        match output.image {
            Some(image) if tools::returns_image(&call.name) && !image.is_empty() => {
                // Checkpoints keep screenshots base64-encoded.
                let image = parse_data_url(&image)
                    .map(|data| to_data_url(&data.media_type, &data.data))
                    .unwrap_or(image);
                Message::tool_result_with_image(&call.id, &call.name, payload, image)
            }
            _ => Message::tool_result(&call.id, &call.name, payload),
        }
    }
}

fn error_result(call: &ToolCall, message: String) -> Message {
    Message::tool_result(
        &call.id,
        &call.name,
        json!({ "error": message }).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_binds_target_and_identity() {
        let session = SessionContext {
            target: "https://example.com".into(),
            identity_token: "nav-7".into(),
            instructions: String::new(),
            document_summary: String::new(),
            initial_snapshot: None,
        };
        assert_eq!(session.session_key(), "https://example.com#nav-7");
    }

    #[test]
    fn options_debug_hides_callback() {
        let options = AgentOptions::default()
            .with_max_turns(3)
            .with_progress(|_| Ok(()));
        let debug = format!("{options:?}");
        assert!(debug.contains("max_turns: Some(3)"));
        assert!(debug.contains("on_progress: true"));
    }

    #[test]
    fn error_results_are_json() {
        let call = ToolCall {
            id: "c1".into(),
            name: "inspect".into(),
            arguments: json!({}),
        };
        let msg = error_result(&call, "boom".into());
        let value: serde_json::Value = serde_json::from_str(&msg.text()).unwrap();
        assert_eq!(value["error"], "boom");
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
    }
}
