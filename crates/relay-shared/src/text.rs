use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

/// Cap for the JSON fallback of content that has no recognizable text.
pub const SERIALIZED_CONTENT_LIMIT: usize = 1000;

pub const TRUNCATION_MARKER: &str = "\n\n… (truncated)";

const TOOL_PART_TYPES: &[&str] = &["tool-invocation", "tool_use", "tool-call", "tool_call"];

// Placeholder delimiters for parked code spans and link targets.
// Private-use code points never survive escaping from real input in practice.
const SLOT_OPEN: char = '\u{E000}';
const SLOT_CLOSE: char = '\u{E001}';

/// Flatten assistant message content into display text.
///
/// Strings pass through untouched, so the function is idempotent on flat
/// text. Part lists keep text parts, render tool calls as `[Tool: name]`
/// and drop step markers.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(parts) => join_parts(parts),
        Value::Object(obj) => {
            if let Some(Value::Array(parts)) = obj.get("parts") {
                return join_parts(parts);
            }
            if let Some(text) = obj.get("text").and_then(|v| v.as_str()) {
                return text.to_string();
            }
            match obj.get("content") {
                Some(inner @ (Value::String(_) | Value::Array(_))) => extract_text(inner),
                _ => serialize_capped(content),
            }
        }
        other => serialize_capped(other),
    }
}

fn join_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(render_part)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn render_part(part: &Value) -> Option<String> {
    if let Some(s) = part.as_str() {
        return Some(s.to_string());
    }
    let kind = part.get("type").and_then(|v| v.as_str()).unwrap_or("");
    if kind == "text" {
        return part.get("text").and_then(|v| v.as_str()).map(str::to_string);
    }
    if TOOL_PART_TYPES.contains(&kind) {
        let name = part
            .get("toolName")
            .or_else(|| part.get("name"))
            .or_else(|| part.pointer("/toolInvocation/toolName"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        return Some(format!("[Tool: {name}]"));
    }
    // step-start / step-finish and unknown kinds
    None
}

fn serialize_capped(value: &Value) -> String {
    let raw = serde_json::to_string(value).unwrap_or_default();
    truncate_chars(&raw, SERIALIZED_CONTENT_LIMIT, "…")
}

/// Truncate to at most `max_chars` characters of source text, appending
/// `marker` when anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((end, _)) => format!("{}{marker}", &text[..end]),
    }
}

/// Escape the characters Telegram HTML treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

cached_regex!(fenced_code_re, r"```([A-Za-z0-9_+\-]*)[ \t]*\n?([\s\S]*?)```");
cached_regex!(inline_code_re, r"`([^`\n]+)`");
cached_regex!(bold_re, r"\*\*([^*\n]+)\*\*");
cached_regex!(italic_star_re, r"\*([^*\s](?:[^*\n]*[^*\s])?)\*");
cached_regex!(italic_underscore_re, r"(^|[^A-Za-z0-9_])_([^_\n]+)_([^A-Za-z0-9_]|$)");
cached_regex!(link_re, r"\[([^\]\n]+)\]\(([^)\s]+)\)");
cached_regex!(strike_re, r"~~([^~\n]+)~~");
cached_regex!(slot_re, "\u{E000}(\\d+)\u{E001}");
cached_regex!(tag_re, r"<[^>]*>");

/// Convert markdown-style spans into Telegram HTML.
///
/// Reserved characters are escaped before any tag is inserted. Spans are
/// rewritten in a fixed order: fenced code, inline code, bold, italic,
/// links, strikethrough. Code contents and link targets are parked in
/// slots so the later rewrites cannot touch them.
pub fn to_hypertext(text: &str) -> String {
    let escaped = escape_html(text);
    let mut slots: Vec<String> = Vec::new();

    let out = fenced_code_re().replace_all(&escaped, |caps: &Captures| {
        let lang = &caps[1];
        let code = caps[2].trim_end_matches('\n');
        let html = if lang.is_empty() {
            format!("<pre>{code}</pre>")
        } else {
            format!("<pre><code class=\"language-{lang}\">{code}</code></pre>")
        };
        park(html, &mut slots)
    });
    let out = inline_code_re().replace_all(&out, |caps: &Captures| {
        park(format!("<code>{}</code>", &caps[1]), &mut slots)
    });

    let out = link_re().replace_all(&out, |caps: &Captures| {
        let href = caps[2].replace('"', "&quot;");
        format!("[{}]({})", &caps[1], park(href, &mut slots))
    });

    let out = bold_re().replace_all(&out, "<b>$1</b>");
    let out = italic_star_re().replace_all(&out, "<i>$1</i>");
    let out = italic_underscore_re().replace_all(&out, "${1}<i>${2}</i>${3}");
    let out = link_re().replace_all(&out, "<a href=\"$2\">$1</a>");
    let out = strike_re().replace_all(&out, "<s>$1</s>");

    slot_re()
        .replace_all(&out, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| slots.get(i).cloned())
                .unwrap_or_default()
        })
        .into_owned()
}

fn park(html: String, slots: &mut Vec<String>) -> String {
    slots.push(html);
    format!("{SLOT_OPEN}{}{SLOT_CLOSE}", slots.len() - 1)
}

/// Strip tags and decode the entities `to_hypertext` emits, for sending
/// rendered HTML as plain text.
pub fn hypertext_to_plain(html: &str) -> String {
    tag_re()
        .replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Single-line button label: newlines and symbols removed, whitespace
/// collapsed, capped at `max_chars`. Letters and digits of any script
/// (including CJK) are kept.
pub fn label_preview(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "(empty)".to_string();
    }
    truncate_chars(&collapsed, max_chars, "…")
}
