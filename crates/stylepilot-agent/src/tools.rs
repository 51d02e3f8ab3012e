//! The fixed tool set exposed to the model, and the collaborator traits the
//! agent loop drives.
//!
//! The schemas here are the stable contract every vendor encoder must be
//! able to translate.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::color;
use crate::error::Result;
use crate::llm::types::ToolDefinition;

pub const INSPECT: &str = "inspect";
pub const APPLY_CSS: &str = "apply_css";
pub const GET_COLOR_PALETTE: &str = "get_color_palette";
pub const CHECK_CONTRAST: &str = "check_contrast";
pub const SCROLL_AND_CAPTURE: &str = "scroll_and_capture";

/// The five tools offered on every turn.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            INSPECT,
            "Inspect elements matching a CSS selector. Returns tag names, classes, \
             computed colors, fonts and box sizes for up to `limit` matches.",
            json!({
                "type": "object",
                "properties": {
                    "selector": {"type": "string", "description": "CSS selector to match"},
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of elements to return",
                        "minimum": 1,
                        "maximum": 50
                    }
                },
                "required": ["selector"]
            }),
        ),
        ToolDefinition::new(
            APPLY_CSS,
            "Apply a complete stylesheet to the page, replacing any previously applied \
             CSS, and return a screenshot of the result.",
            json!({
                "type": "object",
                "properties": {
                    "css": {"type": "string", "description": "The full stylesheet to apply"}
                },
                "required": ["css"]
            }),
        ),
        ToolDefinition::new(
            GET_COLOR_PALETTE,
            "List the most common text and background colors currently on the page.",
            json!({"type": "object", "properties": {}}),
        ),
        ToolDefinition::new(
            CHECK_CONTRAST,
            "Compute the WCAG contrast ratio between a text color and a background color.",
            json!({
                "type": "object",
                "properties": {
                    "foreground": {"type": "string", "description": "Text color, any CSS color syntax"},
                    "background": {"type": "string", "description": "Background color, any CSS color syntax"}
                },
                "required": ["foreground", "background"]
            }),
        ),
        ToolDefinition::new(
            SCROLL_AND_CAPTURE,
            "Scroll the page to a vertical offset in pixels and return a screenshot of \
             the viewport.",
            json!({
                "type": "object",
                "properties": {
                    "y": {"type": "number", "description": "Vertical scroll offset in pixels", "minimum": 0}
                },
                "required": ["y"]
            }),
        ),
    ]
}

/// Tools whose output may carry a screenshot.
pub fn returns_image(tool_name: &str) -> bool {
    matches!(tool_name, APPLY_CSS | SCROLL_AND_CAPTURE)
}

/// What a tool execution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// JSON result handed back to the model.
    pub result: Value,
    /// Optional screenshot as a `data:` URL, kept apart from `result` so it
    /// can be pruned on its own.
    pub image: Option<String>,
}

impl ToolOutput {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            image: None,
        }
    }

    pub fn with_image(result: Value, image: impl Into<String>) -> Self {
        Self {
            result,
            image: Some(image.into()),
        }
    }
}

/// Runs tool calls against the inspected document.
///
/// Argument validation beyond required-field presence is the executor's
/// job; the loop records any error it returns as the tool's result.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_name: &str, arguments: &Value) -> Result<ToolOutput>;
}

/// Reports the identity of the target context (e.g. the document's load
/// token) so the loop can stop when it changes underneath it.
#[async_trait]
pub trait ContextMonitor: Send + Sync {
    async fn current_identity(&self) -> Result<String>;
}

/// A monitor whose identity never changes.
#[derive(Debug, Clone)]
pub struct FixedContext(pub String);

#[async_trait]
impl ContextMonitor for FixedContext {
    async fn current_identity(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Local `check_contrast` implementation for executors that have no better
/// source than the colors the model passed.
pub fn contrast_tool_output(arguments: &Value) -> Result<ToolOutput> {
    let foreground = arguments["foreground"].as_str().unwrap_or_default();
    let background = arguments["background"].as_str().unwrap_or_default();
    let report = color::check_contrast(foreground, background)?;
    Ok(ToolOutput::new(serde_json::to_value(report)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tooling::validate_tools;

    #[test]
    fn definitions_are_valid_and_unique() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), 5);
        validate_tools(&tools).unwrap();
        for tool in &tools {
            assert_eq!(tool.parameters["type"], "object", "{}", tool.name);
        }
    }

    #[test]
    fn screenshot_tools() {
        assert!(returns_image(APPLY_CSS));
        assert!(returns_image(SCROLL_AND_CAPTURE));
        assert!(!returns_image(INSPECT));
        assert!(!returns_image(CHECK_CONTRAST));
    }

    #[test]
    fn local_contrast_tool() {
        let output =
            contrast_tool_output(&json!({"foreground": "#000", "background": "white"})).unwrap();
        assert_eq!(output.result["ratio"], 21.0);
        assert_eq!(output.result["aa_normal"], true);
        assert!(output.image.is_none());
        assert!(contrast_tool_output(&json!({"foreground": "#000"})).is_err());
    }
}
