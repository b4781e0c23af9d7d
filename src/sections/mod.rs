//! Keeps exactly one canonical FAQ block, references block and key-takeaways
//! box in a body.

pub mod detect;
pub mod render;

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Clock, IdSource};
use crate::html::{Document, TextIndex};
use crate::record::{FaqItem, Reference};
use crate::settings::SectionSettings;

pub use detect::{detect, SectionDescriptor, SectionKind};
pub use render::{render_faq, render_references, render_takeaways};

const FAQ_SLOT: &str = "<!-- FAQ_SLOT -->";

static FAQ_SLOTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!-- FAQ_SLOT -->(?:\s*<!-- FAQ_SLOT -->)*").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

const CONCLUSION_PHRASES: &[&str] = &["conclusion", "summary", "final thoughts", "wrapping up"];

/// Where a canonical block ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// An existing block was already canonical.
    Unchanged,
    Placeholder,
    BeforeFaq,
    BeforeConclusion,
    BeforeReferences,
    BeforeLastHeading,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Canonicalized {
    pub html: String,
    pub placement: Placement,
    pub removed: usize,
}

impl Canonicalized {
    fn unchanged(html: &str) -> Self {
        Self {
            html: html.to_string(),
            placement: Placement::Unchanged,
            removed: 0,
        }
    }
}

/// Replaces every FAQ block with one freshly rendered from `faqs`.
pub fn canonicalize_faq(
    html: &str,
    faqs: &[FaqItem],
    settings: &SectionSettings,
    ids: &mut dyn IdSource,
) -> Canonicalized {
    if faqs.is_empty() {
        return Canonicalized::unchanged(html);
    }

    let blocks = detect(html, SectionKind::Faq, faqs.len(), settings.canonical_ratio);
    if let [only] = blocks.as_slice() {
        if only.is_canonical_quality {
            debug!("FAQ block already canonical");
            return Canonicalized::unchanged(html);
        }
    }

    let spans: Vec<_> = blocks.iter().map(|b| b.span.clone()).collect();
    let slotted = splice_out(html, &spans, &format!("\n{}\n", FAQ_SLOT));
    let slotted = FAQ_SLOTS_RE.replace_all(&slotted, FAQ_SLOT);
    let rendered = render_faq(faqs, ids);

    let (placed, placement) = match slotted.find(FAQ_SLOT) {
        Some(at) => {
            let rest = slotted[at + FAQ_SLOT.len()..].replace(FAQ_SLOT, "");
            (format!("{}{}{}", &slotted[..at], rendered, rest), Placement::Placeholder)
        }
        None => place_faq(&slotted, &rendered),
    };

    info!(
        "FAQ canonicalized: {} removed, placed {:?}",
        blocks.len(),
        placement
    );
    Canonicalized {
        html: tidy(&placed),
        placement,
        removed: blocks.len(),
    }
}

/// Start of the first conclusion heading or conclusion-classed element.
fn conclusion_start(doc: &Document) -> Option<usize> {
    let index = TextIndex::build(doc);
    doc.elements()
        .find(|(id, el)| {
            let heading = el.name == "h2" && {
                let text = index.text_of(*id).to_lowercase();
                CONCLUSION_PHRASES.iter().any(|p| detect::contains_phrase(&text, p))
            };
            heading || el.attr("class").is_some_and(|c| c.to_lowercase().contains("conclusion"))
        })
        .map(|(id, _)| doc.node(id).span.start)
}

fn place_faq(html: &str, rendered: &str) -> (String, Placement) {
    let doc = Document::parse(html);

    if let Some(at) = conclusion_start(&doc) {
        return (insert_block(html, at, rendered), Placement::BeforeConclusion);
    }

    if let Some(refs) = detect(html, SectionKind::References, 0, 0.0).first() {
        return (
            insert_block(html, refs.span.start, rendered),
            Placement::BeforeReferences,
        );
    }

    let h2: Vec<_> = doc.elements().filter(|(_, el)| el.name == "h2").collect();
    if h2.len() >= 2 {
        if let Some((id, _)) = h2.last() {
            let at = doc.node(*id).span.start;
            return (insert_block(html, at, rendered), Placement::BeforeLastHeading);
        }
    }

    (format!("{}\n\n{}", html.trim_end(), rendered), Placement::Append)
}

/// Replaces every key-takeaways box with one rendered from `items`, placed
/// right before the FAQ, else before the conclusion or references, else at
/// the end.
pub fn canonicalize_takeaways(
    html: &str,
    items: &[String],
    settings: &SectionSettings,
    ids: &mut dyn IdSource,
) -> Canonicalized {
    let items: Vec<String> = items
        .iter()
        .filter(|t| !t.trim().is_empty())
        .cloned()
        .collect();
    if items.is_empty() {
        return Canonicalized::unchanged(html);
    }

    let blocks = detect(html, SectionKind::Takeaways, items.len(), settings.canonical_ratio);
    if let [only] = blocks.as_slice() {
        if only.is_canonical_quality {
            debug!("key takeaways already canonical");
            return Canonicalized::unchanged(html);
        }
    }

    let spans: Vec<_> = blocks.iter().map(|b| b.span.clone()).collect();
    let stripped = splice_out(html, &spans, "");
    let rendered = render_takeaways(&items, ids);

    let doc = Document::parse(&stripped);
    let anchor = detect(&stripped, SectionKind::Faq, 0, 0.0)
        .first()
        .map(|faq| (faq.span.start, Placement::BeforeFaq))
        .or_else(|| conclusion_start(&doc).map(|at| (at, Placement::BeforeConclusion)))
        .or_else(|| {
            detect(&stripped, SectionKind::References, 0, 0.0)
                .first()
                .map(|refs| (refs.span.start, Placement::BeforeReferences))
        });
    let (placed, placement) = match anchor {
        Some((at, placement)) => (insert_block(&stripped, at, &rendered), placement),
        None => (format!("{}\n\n{}", stripped.trim_end(), rendered), Placement::Append),
    };

    info!(
        "key takeaways canonicalized: {} removed, placed {:?}",
        blocks.len(),
        placement
    );
    Canonicalized {
        html: tidy(&placed),
        placement,
        removed: blocks.len(),
    }
}

/// Replaces every references block with one rendered from the valid
/// entries of `refs`, always at the end of the body. With nothing to render,
/// the last existing block is moved to the end instead.
pub fn canonicalize_references(
    html: &str,
    refs: &[Reference],
    settings: &SectionSettings,
    clock: &dyn Clock,
    ids: &mut dyn IdSource,
) -> Canonicalized {
    let valid: Vec<Reference> = refs.iter().filter(|r| r.is_renderable()).cloned().collect();
    if valid.is_empty() {
        debug!("no renderable references");
        return move_references_last(html);
    }

    let blocks = detect(html, SectionKind::References, valid.len(), settings.canonical_ratio);
    if let [only] = blocks.as_slice() {
        if only.is_canonical_quality && html[only.span.end..].trim().is_empty() {
            debug!("references block already canonical");
            return Canonicalized::unchanged(html);
        }
    }

    let spans: Vec<_> = blocks.iter().map(|b| b.span.clone()).collect();
    let stripped = splice_out(html, &spans, "");
    let rendered = render_references(&valid, clock, ids);
    info!("references canonicalized: {} removed, {} cited", blocks.len(), valid.len());

    Canonicalized {
        html: tidy(&format!("{}\n\n{}", stripped.trim_end(), rendered)),
        placement: Placement::Append,
        removed: blocks.len(),
    }
}

fn move_references_last(html: &str) -> Canonicalized {
    let blocks = detect(html, SectionKind::References, 0, 0.0);
    let Some(last) = blocks.last() else {
        return Canonicalized::unchanged(html);
    };
    if blocks.len() == 1 && html[last.span.end..].trim().is_empty() {
        return Canonicalized::unchanged(html);
    }

    let kept = &html[last.span.clone()];
    let spans: Vec<_> = blocks.iter().map(|b| b.span.clone()).collect();
    let stripped = splice_out(html, &spans, "");
    info!("existing references block moved to the end, {} dropped", blocks.len() - 1);
    Canonicalized {
        html: tidy(&format!("{}\n\n{}", stripped.trim_end(), kept)),
        placement: Placement::Append,
        removed: blocks.len() - 1,
    }
}

/// Keeps only the last block of `kind`. Each removed block takes the
/// whitespace right after it along.
pub fn deduplicate(html: &str, kind: SectionKind) -> String {
    let blocks = detect(html, kind, 0, 0.0);
    if blocks.len() < 2 {
        return html.to_string();
    }

    let spans: Vec<Range<usize>> = blocks[..blocks.len() - 1]
        .iter()
        .map(|b| {
            let trailing = html[b.span.end..].len() - html[b.span.end..].trim_start().len();
            b.span.start..b.span.end + trailing
        })
        .collect();
    info!("removed {} duplicate {:?} blocks", spans.len(), kind);
    splice_out(html, &spans, "")
}

/// Drops every `h1`; the title is rendered outside the body.
pub fn strip_h1(html: &str) -> String {
    let doc = Document::parse(html);
    let spans: Vec<_> = doc
        .elements()
        .filter(|(_, el)| el.name == "h1")
        .map(|(id, _)| doc.node(id).span.clone())
        .collect();
    if spans.is_empty() {
        return html.to_string();
    }
    debug!("stripping {} h1 elements", spans.len());
    tidy(&splice_out(html, &outermost(spans), ""))
}

/// Spans nested inside an earlier span are dropped. Input is in document order.
fn outermost(spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    let mut kept: Vec<Range<usize>> = Vec::new();
    for span in spans {
        if kept.last().is_some_and(|k| span.start < k.end) {
            continue;
        }
        kept.push(span);
    }
    kept
}

/// Replaces each non-overlapping span (document order) with `with`.
fn splice_out(html: &str, spans: &[Range<usize>], with: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&html[cursor..span.start]);
        out.push_str(with);
        cursor = span.end;
    }
    out.push_str(&html[cursor..]);
    out
}

fn insert_block(html: &str, at: usize, block: &str) -> String {
    format!("{}\n\n{}\n\n{}", &html[..at], block, &html[at..])
}

/// Collapses blank-line runs outside `<pre>` and trims the ends.
fn tidy(html: &str) -> String {
    let doc = Document::parse(html);
    let pre = outermost(
        doc.elements()
            .filter(|(_, el)| el.name == "pre")
            .map(|(id, _)| doc.node(id).span.clone())
            .collect(),
    );

    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for span in pre {
        out.push_str(&BLANK_LINES_RE.replace_all(&html[cursor..span.start], "\n\n"));
        out.push_str(&html[span.clone()]);
        cursor = span.end;
    }
    out.push_str(&BLANK_LINES_RE.replace_all(&html[cursor..], "\n\n"));
    out.trim().to_string()
}

// ── Tests ──
