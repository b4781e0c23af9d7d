//! Healing pass for truncated or syntactically damaged payloads. Every step
//! is string-aware and never rewrites bytes inside a string literal.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::scan::{open_state, string_mask};

static BODY_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:htmlContent|body)"\s*:\s*""#).unwrap());

/// Closing tags a truncated body can safely be cut after.
const SAFE_CLOSING_TAGS: &[&str] = &[
    "</p>", "</div>", "</section>", "</h2>", "</h3>", "</h4>", "</ul>", "</ol>", "</table>",
    "</blockquote>",
];

/// Closes the body string and supplies the fields that follow it.
const SAFE_TAIL: &str = r#"","faqs":[],"schema":{"@context":"https://schema.org","@graph":[]},"structureVerified":false}"#;

/// Runs every healing step in order and returns the repaired text.
pub fn heal(candidate: &str, trim_threshold: f64) -> String {
    let mut text = candidate.to_string();

    if body_is_unterminated(&text) {
        if let Some(healed) = synthesize_safe_tail(&text) {
            debug!("truncated body closed at last safe tag");
            text = healed;
        }
    } else if let Some(trimmed) = trim_to_last_entry(&text, trim_threshold) {
        debug!(
            dropped = text.len() - trimmed.len(),
            "trimmed incomplete suffix"
        );
        text = trimmed;
    }

    let text = fix_syntax(&text);
    let text = escape_control_chars(&text);
    balance(&text)
}

/// Byte offset just past the opening quote of the body value.
fn body_value_start(text: &str) -> Option<usize> {
    BODY_KEY_RE.find(text).map(|m| m.end())
}

/// The body counts as closed when some unescaped quote after its start is
/// followed by `,` or `}`. Unescaped attribute quotes inside the HTML are
/// followed by other characters and do not end it.
fn body_is_unterminated(text: &str) -> bool {
    let Some(start) = body_value_start(text) else {
        return false;
    };
    let bytes = text.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => {
                let rest = text[i + 1..].trim_start();
                if rest.starts_with(',') || rest.starts_with('}') {
                    return false;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    true
}

/// Cuts an unterminated body after its last safe closing tag and appends a
/// minimal valid tail. Assumes the body precedes `faqs` and `schema`; any
/// later fields present in the truncated payload are lost.
pub fn synthesize_safe_tail(text: &str) -> Option<String> {
    let start = body_value_start(text)?;
    let body = &text[start..];
    let cut = SAFE_CLOSING_TAGS
        .iter()
        .filter_map(|tag| body.rfind(tag).map(|i| i + tag.len()))
        .max()?;
    Some(format!("{}{}{}", &text[..start], &body[..cut], SAFE_TAIL))
}

/// Drops an incomplete suffix by cutting at the last comma that follows a
/// finished value. Entries closed by `}`/`]` are preferred over plain string
/// values. Only applies to unbalanced text, and only when the cut lies past
/// `threshold × len`.
pub fn trim_to_last_entry(text: &str, threshold: f64) -> Option<String> {
    if open_state(text).is_complete() {
        return None;
    }
    let mask = string_mask(text);
    let bytes = text.as_bytes();
    let mut after_container = None;
    let mut after_string = None;
    let mut last_token = None;
    for (i, &b) in bytes.iter().enumerate() {
        if mask[i] || b.is_ascii_whitespace() {
            continue;
        }
        if b == b',' {
            match last_token {
                Some(b'}') | Some(b']') => after_container = Some(i),
                Some(b'"') => after_string = Some(i),
                _ => {}
            }
        }
        last_token = Some(b);
    }
    let min = (text.len() as f64 * threshold) as usize;
    let cut = after_container
        .filter(|&i| i > min)
        .or(after_string.filter(|&i| i > min))?;
    Some(text[..cut].to_string())
}

/// Removes trailing commas and quotes bare object keys.
pub fn fix_syntax(text: &str) -> String {
    let mask = string_mask(text);
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if mask[i] || c == '"' {
            out.push(c);
            continue;
        }
        if c == ',' {
            let next = text[i + 1..].trim_start().as_bytes().first().copied();
            if matches!(next, Some(b'}') | Some(b']')) {
                continue;
            }
        }
        if (c.is_ascii_alphabetic() || c == '_') && key_position(&out) {
            let mut end = i + 1;
            while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                end += 1;
            }
            if text[end..].trim_start().starts_with(':') {
                out.push('"');
                out.push_str(&text[i..end]);
                out.push('"');
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn key_position(out: &str) -> bool {
    matches!(out.trim_end().chars().last(), Some('{') | Some(','))
}

/// Inside strings raw newlines, returns and tabs become escapes and other
/// control characters are dropped; outside strings only JSON whitespace
/// survives.
pub fn escape_control_chars(text: &str) -> String {
    let mask = string_mask(text);
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        if !c.is_control() {
            out.push(c);
            continue;
        }
        if mask[i] {
            match c {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => {}
            }
        } else if matches!(c, ' ' | '\n' | '\r' | '\t') {
            out.push(c);
        }
    }
    out
}

/// Closes whatever is still open: a dangling string, an entry with a key
/// but no value, a dangling comma, then every open bracket innermost first.
pub fn balance(text: &str) -> String {
    let mut out = text.trim_end().to_string();

    let state = open_state(&out);
    if state.in_string {
        if state.escaped {
            out.pop();
        }
        out.push('"');
    }

    let state = open_state(&out);
    if let Some(top) = state.stack.last() {
        if top.entry_incomplete() {
            out.truncate(top.entry_start);
        }
    }
    loop {
        let trimmed = out.trim_end();
        match trimmed.strip_suffix(',') {
            Some(rest) => out.truncate(rest.len()),
            None => {
                out.truncate(trimmed.len());
                break;
            }
        }
    }
    for frame in state.stack.iter().rev() {
        out.push(frame.close);
    }
    out
}

// ── Tests ──
