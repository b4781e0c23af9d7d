//! Turns script-driven call-to-action buttons into real links. Models like to
//! emit `<button onclick="window.location.href='...'">`, which does nothing
//! once scripts are stripped by the CMS.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::html::{Document, Element};

pub const CTA_CLASS: &str = "wp-opt-cta-button";

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:window\.)?location(?:\.href)?\s*=\s*['"]([^'"]+)['"]"#).unwrap()
});

const CTA_CSS: &str = "
.wp-opt-cta-button { display: inline-flex; align-items: center; justify-content: center; gap: 0.5rem; padding: 1rem 2rem; border-radius: 8px; background: linear-gradient(135deg, #3b82f6 0%, #2563eb 100%); color: #fff; font-weight: 700; text-decoration: none; box-shadow: 0 6px 20px rgba(59, 130, 246, 0.4); transition: transform 0.3s ease, box-shadow 0.3s ease; }
.wp-opt-cta-button:hover { transform: translateY(-3px); box-shadow: 0 10px 30px rgba(59, 130, 246, 0.5); }
.wp-opt-cta-button:focus { outline: 3px solid rgba(59, 130, 246, 0.5); outline-offset: 2px; }
";

#[derive(Debug, Clone, PartialEq)]
pub struct CtaRepair {
    pub html: String,
    pub converted: usize,
}

/// Replaces every button that navigates somewhere (or is styled as a CTA)
/// with an `<a>` carrying the same content. The stylesheet is added once,
/// in front of the body, when a converted button needs it.
pub fn repair_cta_links(html: &str) -> CtaRepair {
    let doc = Document::parse(html);
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for (id, el) in doc.elements() {
        if el.name != "button" {
            continue;
        }
        let span = doc.node(id).span.clone();
        if span.is_empty() || edits.last().is_some_and(|(prev, _)| span.start < prev.end) {
            continue;
        }
        let Some(open) = anchor_tag(el) else {
            continue;
        };
        debug!(tag = %open, "converting CTA button");
        edits.push((span, format!("{}{}</a>", open, doc.inner_html(id))));
    }

    if edits.is_empty() {
        return CtaRepair {
            html: html.to_string(),
            converted: 0,
        };
    }

    let mut out = String::with_capacity(html.len() + CTA_CSS.len());
    if !html.contains(&format!(".{}", CTA_CLASS)) {
        out.push_str(&format!("<style>{}</style>\n", CTA_CSS));
    }
    let mut cursor = 0;
    for (span, replacement) in &edits {
        out.push_str(&html[cursor..span.start]);
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(&html[cursor..]);

    info!(converted = edits.len(), "CTA buttons turned into links");
    CtaRepair {
        html: out,
        converted: edits.len(),
    }
}

/// Opening `<a>` tag for a button, or `None` when it is an ordinary form
/// button.
fn anchor_tag(el: &Element) -> Option<String> {
    let classes = el.attr("class").unwrap_or("").trim();
    let target = el
        .attr("onclick")
        .and_then(|js| LOCATION_RE.captures(js))
        .map(|c| c[1].to_string())
        .or_else(|| el.attr("data-url").map(str::to_string))
        .or_else(|| el.attr("data-href").map(str::to_string))
        .filter(|url| !url.trim().is_empty());

    let href = match target {
        Some(url) => url,
        None if looks_like_cta(classes) => "#".to_string(),
        None => return None,
    };

    let class = if classes.split_whitespace().any(|c| c == CTA_CLASS) {
        classes.to_string()
    } else if classes.is_empty() {
        CTA_CLASS.to_string()
    } else {
        format!("{} {}", CTA_CLASS, classes)
    };

    let mut tag = format!(
        "<a href=\"{}\" class=\"{}\"",
        href.replace('"', "&quot;"),
        class.replace('"', "&quot;")
    );
    if is_external(&href) {
        tag.push_str(" target=\"_blank\" rel=\"noopener noreferrer\"");
    }
    tag.push('>');
    Some(tag)
}

fn looks_like_cta(classes: &str) -> bool {
    let classes = classes.to_ascii_lowercase();
    classes.contains("cta") || classes.contains("button")
}

fn is_external(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}

// ── Tests ──
