//! Text helpers for agent content: summary markup and speculative JSON.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static RE_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static RE_JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").unwrap());

/// Escape the characters that matter inside HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Summary text as stored for the dashboard: escaped, `**x**` as
/// `<strong>x</strong>`, then `*x*` as `<em>x</em>`.
pub fn format_summary(text: &str) -> String {
    let escaped = escape_html(text);
    let bold = RE_BOLD.replace_all(&escaped, "<strong>$1</strong>");
    RE_ITALIC.replace_all(&bold, "<em>$1</em>").into_owned()
}

/// Inner text of the first fenced ```json block, trimmed.
pub fn extract_json_block(content: &str) -> Option<&str> {
    RE_JSON_BLOCK
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Decode JSON that may or may not be there. Agents often emit partial or
/// prose-wrapped fragments, so failure is an expected outcome.
pub fn best_effort_json(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Best-effort decode of the fenced JSON block embedded in agent content.
pub fn embedded_json(content: &str) -> Option<Value> {
    extract_json_block(content).and_then(best_effort_json)
}

/// URLs announced by the search agent (`{"urls": [...]}` in a fenced block).
pub fn search_urls(content: &str) -> Option<Vec<String>> {
    let value = embedded_json(content)?;
    let urls = value.get("urls")?.as_array()?;
    Some(
        urls.iter()
            .filter_map(|u| u.as_str().map(String::from))
            .collect(),
    )
}

/// Error text embedded by an agent in its fenced JSON output, if any.
pub fn embedded_error(content: &str) -> Option<String> {
    let value = embedded_json(content)?;
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        ),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary_bold() {
        assert_eq!(format_summary("**Hi**"), "<strong>Hi</strong>");
    }

    #[test]
    fn test_format_summary_bold_then_italic() {
        assert_eq!(
            format_summary("**Market** is *growing*"),
            "<strong>Market</strong> is <em>growing</em>"
        );
    }

    #[test]
    fn test_format_summary_escapes_markup_first() {
        assert_eq!(
            format_summary("<script>alert(1)</script> & **ok**"),
            "&lt;script&gt;alert(1)&lt;/script&gt; &amp; <strong>ok</strong>"
        );
    }

    #[test]
    fn test_extract_json_block() {
        let content = "Found these:\n```json\n{\"urls\": [\"https://a.example\"]}\n```\nDone";
        assert_eq!(extract_json_block(content), Some(r#"{"urls": ["https://a.example"]}"#));
        assert_eq!(extract_json_block("no block here"), None);
    }

    #[test]
    fn test_best_effort_json_rejects_fragments() {
        assert!(best_effort_json(r#"{"urls": ["https://a.exa"#).is_none());
        assert!(best_effort_json("plain prose").is_none());
        assert!(best_effort_json(r#" {"a": 1} "#).is_some());
    }

    #[test]
    fn test_search_urls() {
        let content = "```json\n{\"urls\": [\"https://a.example\", \"https://b.example\"]}\n```";
        assert_eq!(
            search_urls(content),
            Some(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
        assert_eq!(search_urls("```json\n{\"other\": 1}\n```"), None);
    }

    #[test]
    fn test_embedded_error() {
        assert_eq!(
            embedded_error("```json\n{\"error\": \"quota exceeded\"}\n```"),
            Some("quota exceeded".to_string())
        );
        assert_eq!(
            embedded_error("```json\n{\"error\": {\"message\": \"denied\"}}\n```"),
            Some("denied".to_string())
        );
        assert_eq!(embedded_error("```json\n{\"error\": null}\n```"), None);
        assert_eq!(embedded_error("```json\n{\"metrics\": []}\n```"), None);
    }
}
