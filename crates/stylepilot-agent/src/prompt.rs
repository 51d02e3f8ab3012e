//! Prompts for the styling agent.

use crate::llm::types::Message;
use crate::runtime::SessionContext;
use crate::tools::{APPLY_CSS, CHECK_CONTRAST, GET_COLOR_PALETTE, INSPECT, SCROLL_AND_CAPTURE};

/// The system prompt sent on every turn.
pub fn system_prompt() -> String {
    format!(
        "You are a meticulous front-end designer who restyles existing web pages with CSS.\n\
         \n\
         You can call tools to study the page before answering:\n\
         - `{INSPECT}`: look at elements matching a selector.\n\
         - `{GET_COLOR_PALETTE}`: list the colors the page currently uses.\n\
         - `{CHECK_CONTRAST}`: verify that text and background colors are readable.\n\
         - `{APPLY_CSS}`: apply a full candidate stylesheet and see a screenshot.\n\
         - `{SCROLL_AND_CAPTURE}`: scroll and see another part of the page.\n\
         \n\
         Rules:\n\
         1. Only style elements that exist; inspect before guessing selectors.\n\
         2. Every `{APPLY_CSS}` call replaces the previous stylesheet, so always send \
            the complete CSS.\n\
         3. Keep body text at WCAG AA contrast (4.5:1) or better.\n\
         4. Do not change page content or layout semantics beyond what was asked.\n\
         5. You have a limited number of turns. When you are satisfied, stop calling \
            tools and reply with the final stylesheet in a single ```css fenced block \
            and nothing else."
    )
}

/// The first user message of a fresh run.
pub fn initial_user_message(session: &SessionContext) -> Message {
    let mut text = format!("Restyle the document `{}`.\n\n", session.target);

    let instructions = session.instructions.trim();
    if instructions.is_empty() {
        text.push_str("Request: improve the visual design while keeping it readable.\n");
    } else {
        text.push_str(&format!("Request: {instructions}\n"));
    }

    let summary = session.document_summary.trim();
    if !summary.is_empty() {
        text.push_str(&format!("\nDocument summary:\n{summary}\n"));
    }

    match session.initial_snapshot.as_deref() {
        Some(snapshot) if !snapshot.is_empty() => {
            text.push_str("\nA screenshot of the page as it looks now is attached.\n");
            Message::user_with_image(text, snapshot)
        }
        _ => Message::user(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(snapshot: Option<&str>) -> SessionContext {
        SessionContext {
            target: "https://example.com/blog".into(),
            identity_token: "load-1".into(),
            instructions: "Dark mode please".into(),
            document_summary: "<h1> title, 3 <article> cards, <footer>".into(),
            initial_snapshot: snapshot.map(str::to_owned),
        }
    }

    #[test]
    fn system_prompt_names_every_tool() {
        let prompt = system_prompt();
        for tool in crate::tools::tool_definitions() {
            assert!(prompt.contains(&tool.name), "{}", tool.name);
        }
        assert!(prompt.contains("```css"));
    }

    #[test]
    fn initial_message_carries_context() {
        let msg = initial_user_message(&session(None));
        let text = msg.text();
        assert!(text.contains("Dark mode please"));
        assert!(text.contains("3 <article> cards"));
        assert!(msg.content.images().is_empty());
    }

    #[test]
    fn initial_snapshot_is_attached() {
        let msg = initial_user_message(&session(Some("data:image/png;base64,AAAA")));
        assert_eq!(msg.content.images(), vec!["data:image/png;base64,AAAA"]);
    }
}
