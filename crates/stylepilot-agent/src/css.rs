//! CSS extraction from model output.
//!
//! Models wrap their answer in prose, markdown fences or `<style>` tags.
//! [`extract_css`] peels those layers off and only accepts the remainder if
//! it is structurally CSS. Extraction is idempotent: feeding its output back
//! in returns the same string.

use std::sync::LazyLock;

use regex::Regex;

/// A complete fenced block: language tag, then the body.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[^\n]*\n(.*?)```").expect("fence pattern is valid")
});

static STYLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?style\b[^>]*>").expect("style pattern is valid"));

/// `selector { property: value }`, allowing other declarations around it.
static CSS_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^{}\s][^{}]*\{[^{}]*?[-A-Za-z0-9_]+\s*:\s*[^\s{};][^{}]*\}")
        .expect("rule pattern is valid")
});

/// Extract a CSS stylesheet from free-form model text.
///
/// Returns `None` when nothing CSS-shaped remains.
pub fn extract_css(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let body = fenced_body(trimmed).unwrap_or(trimmed);
    let stripped = STYLE_TAG.replace_all(body, "");
    let css = stripped.trim();

    looks_like_css(css).then(|| css.to_owned())
}

/// Whether `text` contains at least one `selector { property: value }` rule.
pub fn looks_like_css(text: &str) -> bool {
    CSS_RULE.is_match(text)
}

/// Contents of the preferred fenced block, if the text has one.
///
/// A block tagged `css` wins over the first block. An opening fence with no
/// closing fence (truncated output) yields everything after the fence line.
fn fenced_body(text: &str) -> Option<&str> {
    let mut first: Option<&str> = None;
    for caps in FENCED_BLOCK.captures_iter(text) {
        let body = caps.get(2).map_or("", |m| m.as_str());
        let lang = caps.get(1).map_or("", |m| m.as_str());
        if lang.eq_ignore_ascii_case("css") {
            return Some(body);
        }
        first.get_or_insert(body);
    }
    if first.is_some() {
        return first;
    }

    let start = text.find("```")?;
    let after = &text[start + 3..];
    let rest = after.split_once('\n').map_or("", |(_, rest)| rest);
    Some(rest.trim_end().trim_end_matches("```"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_css_passes_through_trimmed() {
        assert_eq!(
            extract_css("  body { color: #111; }\n").as_deref(),
            Some("body { color: #111; }")
        );
    }

    #[test]
    fn css_fence_is_preferred() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\n```css\nh1 { font-weight: 700; }\n```\nEnjoy!";
        assert_eq!(extract_css(text).as_deref(), Some("h1 { font-weight: 700; }"));
    }

    #[test]
    fn first_fence_is_used_without_css_tag() {
        let text = "```\na { text-decoration: none }\n```";
        assert_eq!(extract_css(text).as_deref(), Some("a { text-decoration: none }"));
    }

    #[test]
    fn unterminated_fence_uses_the_remainder() {
        let text = "```css\n.card { padding: 8px; }\n.card h2 { margin: 0";
        assert_eq!(
            extract_css(text).as_deref(),
            Some(".card { padding: 8px; }\n.card h2 { margin: 0")
        );
    }

    #[test]
    fn style_tags_are_stripped() {
        let text = "<style type=\"text/css\">\np { line-height: 1.5; }\n</style>";
        assert_eq!(extract_css(text).as_deref(), Some("p { line-height: 1.5; }"));
    }

    #[test]
    fn prose_is_rejected() {
        assert_eq!(extract_css("I could not find anything to restyle."), None);
        assert_eq!(extract_css("```\nnot css at all\n```"), None);
        assert_eq!(extract_css("{ color: red }"), None);
        assert_eq!(extract_css(""), None);
    }

    #[test]
    fn nested_at_rules_are_css() {
        assert!(looks_like_css("@media (max-width: 600px) { nav { display: none; } }"));
        assert!(looks_like_css(":root { --accent: #0af; }"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let inputs = [
            "```css\nbody { margin: 0 }\n```",
            "<style>a{color:red}</style>",
            "  .x { top: 0 }  ",
        ];
        for input in inputs {
            let once = extract_css(input).unwrap();
            assert_eq!(extract_css(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn fenced_equals_unwrapped() {
        let css = "main { display: grid; gap: 1rem; }";
        assert_eq!(extract_css(&format!("```css\n{css}\n```")), extract_css(css));
    }
}
