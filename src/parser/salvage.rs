//! Last resort: pull the body out with a tolerant pattern and rebuild a
//! minimal record around it.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use crate::record::ContentRecord;

static BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"htmlContent"\s*:\s*"(.*?)(?:"\s*,\s*"faqs"|"\s*,\s*"schema"|"\s*\})"#).unwrap()
});

fn field_re(name: &str) -> Regex {
    // Field names are fixed identifiers, so the pattern always compiles.
    Regex::new(&format!(r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)""#, name)).unwrap()
}

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| field_re("title"));
static EXCERPT_RE: LazyLock<Regex> = LazyLock::new(|| field_re("excerpt"));
static META_RE: LazyLock<Regex> = LazyLock::new(|| field_re("metaDescription"));
static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| field_re("slug"));

pub fn salvage(text: &str, min_body_chars: usize) -> Option<ContentRecord> {
    let body = unescape(&BODY_RE.captures(text)?[1]);
    if body.chars().count() < min_body_chars {
        return None;
    }
    let field = |re: &Regex| re.captures(text).map(|c| unescape(&c[1]));

    Some(ContentRecord {
        title: field(&TITLE_RE).unwrap_or_else(|| "Untitled".to_string()),
        excerpt: field(&EXCERPT_RE).unwrap_or_default(),
        meta_description: field(&META_RE).unwrap_or_default(),
        slug: field(&SLUG_RE).unwrap_or_else(|| "untitled".to_string()),
        html_body: body,
        faqs: Vec::new(),
        key_takeaways: Vec::new(),
        schema: json!({"@context": "https://schema.org", "@graph": []}),
        word_count: 0,
        structure_verified: false,
    })
}

/// Decodes the escapes a model realistically emits inside HTML strings.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ── Tests ──
