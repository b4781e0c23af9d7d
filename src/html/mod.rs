//! Minimal owned HTML model: a span-tracking tokenizer, an arena tree that
//! tolerates malformed markup, and a plain-text index over it.

pub mod text;
pub mod tokenizer;
pub mod tree;

pub use text::{decode_entities, escape_attr, escape_text, is_block, TextIndex};
pub use tree::{heading_level, is_void, link_element, Document, Element, NodeData, NodeId, ROOT};

/// Plain-text word count of an HTML fragment.
pub fn word_count(html: &str) -> usize {
    let doc = Document::parse(html);
    TextIndex::build(&doc).text().split_whitespace().count()
}

// ── Tests ──
