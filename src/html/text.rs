use std::ops::Range;

use super::tree::{Document, NodeData, NodeId, ROOT};

/// Elements that break the flow of text; a space is inserted around them.
const BLOCK: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "summary", "table", "td", "th", "tr", "ul",
];

/// Elements whose content is never visible text.
const HIDDEN: &[&str] = &["script", "style", "template", "noscript"];

pub fn is_block(name: &str) -> bool {
    BLOCK.contains(&name)
}

/// One text node's contribution to the plain text.
#[derive(Debug, Clone)]
struct Segment {
    node: NodeId,
    plain: Range<usize>,
    /// Raw byte offset for every decoded byte offset, plus one past the end.
    raw_offsets: Vec<usize>,
}

/// Decoded plain text of a document with a map back to the nodes it came from.
#[derive(Debug, Clone)]
pub struct TextIndex {
    text: String,
    ranges: Vec<Option<Range<usize>>>,
    segments: Vec<Segment>,
}

impl TextIndex {
    pub fn build(doc: &Document) -> Self {
        let mut index = TextIndex {
            text: String::new(),
            ranges: vec![None; doc.len()],
            segments: Vec::new(),
        };
        index.walk(doc, ROOT);
        index
    }

    fn separate(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with(char::is_whitespace) {
            self.text.push(' ');
        }
    }

    fn walk(&mut self, doc: &Document, id: NodeId) {
        match &doc.node(id).data {
            NodeData::Text(raw) => {
                let (decoded, raw_offsets) = decode_with_offsets(raw);
                let start = self.text.len();
                self.text.push_str(&decoded);
                self.segments.push(Segment {
                    node: id,
                    plain: start..self.text.len(),
                    raw_offsets,
                });
                self.ranges[id] = Some(start..self.text.len());
            }
            NodeData::Element(el) if HIDDEN.contains(&el.name.as_str()) => {}
            NodeData::Element(el) => {
                let block = is_block(&el.name);
                if block {
                    self.separate();
                }
                let start = self.text.len();
                for &child in doc.children(id) {
                    self.walk(doc, child);
                }
                self.ranges[id] = Some(start..self.text.len());
                if block {
                    self.separate();
                }
            }
            NodeData::Document => {
                for &child in doc.children(id) {
                    self.walk(doc, child);
                }
                self.ranges[id] = Some(0..self.text.len());
            }
            NodeData::Comment(_) | NodeData::Doctype(_) => {}
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Plain-text range of a node; empty for hidden or detached nodes.
    pub fn range(&self, id: NodeId) -> Range<usize> {
        self.ranges.get(id).cloned().flatten().unwrap_or(0..0)
    }

    pub fn text_of(&self, id: NodeId) -> &str {
        &self.text[self.range(id)]
    }

    /// Maps a plain-text range back to a raw byte range inside a single text
    /// node. Ranges that straddle nodes yield `None`.
    pub fn locate(&self, plain: Range<usize>) -> Option<(NodeId, Range<usize>)> {
        let seg = self
            .segments
            .iter()
            .find(|s| s.plain.start <= plain.start && plain.end <= s.plain.end)?;
        let start = seg.raw_offsets[plain.start - seg.plain.start];
        let end = seg.raw_offsets[plain.end - seg.plain.start];
        Some((seg.node, start..end))
    }
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "deg" => '\u{00B0}',
        "middot" => '\u{00B7}',
        "times" => '\u{00D7}',
        _ => return None,
    })
}

/// Decodes the entity starting at `&` in `s`, returning the char and the
/// byte length consumed.
fn entity_at(s: &str) -> Option<(char, usize)> {
    let semi = s.get(1..12.min(s.len()))?.find(';')? + 1;
    let body = &s[1..semi];
    let ch = if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        char::from_u32(code)?
    } else {
        named_entity(body)?
    };
    Some((ch, semi + 1))
}

fn decode_with_offsets(raw: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(raw.len());
    let mut offsets = Vec::with_capacity(raw.len() + 1);
    let mut i = 0;
    while i < raw.len() {
        let rest = &raw[i..];
        let (ch, consumed) = if rest.starts_with('&') {
            entity_at(rest).unwrap_or(('&', 1))
        } else {
            let ch = rest.chars().next().unwrap_or(' ');
            (ch, ch.len_utf8())
        };
        for _ in 0..ch.len_utf8() {
            offsets.push(i);
        }
        out.push(ch);
        i += consumed;
    }
    offsets.push(raw.len());
    (out, offsets)
}

pub fn decode_entities(raw: &str) -> String {
    decode_with_offsets(raw).0
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

// ── Tests ──
