use std::ops::Range;

use super::text::escape_attr;
use super::tokenizer::{Attribute, Token, Tokenizer};

pub type NodeId = usize;

/// The document node; every parsed node descends from it.
pub const ROOT: NodeId = 0;

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Start tags that end an open paragraph.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "menu",
    "nav", "ol", "p", "pre", "section", "table", "ul",
];

pub fn is_void(name: &str) -> bool {
    VOID.contains(&name)
}

/// `h1`..`h6` → 1..6.
pub fn heading_level(name: &str) -> Option<u8> {
    match name.as_bytes() {
        [b'h', d @ b'1'..=b'6'] => Some(d - b'0'),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub self_closing: bool,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(Attribute {
            name: name.to_string(),
            value: Some(value.to_string()),
        });
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|token| token == class))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(Element),
    /// Raw text, entities left encoded.
    Text(String),
    Comment(String),
    Doctype(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Byte span in the source this document was parsed from. Nodes created
    /// by mutation carry an empty span.
    pub span: Range<usize>,
}

/// Arena-backed HTML tree. Detached nodes stay in the arena but are
/// unreachable from [`ROOT`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn parse(src: &str) -> Self {
        let mut doc = Document {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
                span: 0..src.len(),
            }],
        };
        let mut stack: Vec<NodeId> = vec![ROOT];

        for spanned in Tokenizer::new(src) {
            let span = spanned.span;
            let top = *stack.last().unwrap_or(&ROOT);
            match spanned.token {
                Token::Text(t) => {
                    doc.push_node(top, NodeData::Text(t.to_string()), span);
                }
                Token::Comment(c) => {
                    doc.push_node(top, NodeData::Comment(c.to_string()), span);
                }
                Token::Doctype(d) => {
                    doc.push_node(top, NodeData::Doctype(d.to_string()), span);
                }
                Token::StartTag {
                    name,
                    attrs,
                    self_closing,
                } => {
                    doc.close_implied(&mut stack, &name, span.start);
                    let top = *stack.last().unwrap_or(&ROOT);
                    let leaf = self_closing || is_void(&name);
                    let id = doc.push_node(
                        top,
                        NodeData::Element(Element {
                            name,
                            attrs,
                            self_closing,
                        }),
                        span,
                    );
                    if !leaf {
                        stack.push(id);
                    }
                }
                Token::EndTag { name } => {
                    // Stray end tags are dropped.
                    if let Some(pos) = stack
                        .iter()
                        .rposition(|&id| id != ROOT && doc.tag_name(id) == Some(name.as_str()))
                    {
                        let matched = stack[pos];
                        doc.pop_to(&mut stack, pos, span.start);
                        doc.nodes[matched].span.end = span.end;
                    }
                }
            }
        }

        while stack.len() > 1 {
            if let Some(id) = stack.pop() {
                doc.nodes[id].span.end = src.len();
            }
        }
        doc
    }

    /// Pops every open element above `pos` (ending them at `at`) and the
    /// element at `pos` itself; the caller fixes up the final end offset.
    fn pop_to(&mut self, stack: &mut Vec<NodeId>, pos: usize, at: usize) {
        while stack.len() > pos {
            if let Some(id) = stack.pop() {
                self.nodes[id].span.end = at;
            }
        }
    }

    fn close_implied(&mut self, stack: &mut Vec<NodeId>, name: &str, at: usize) {
        let (targets, stops): (&[&str], &[&str]) = match name {
            "li" => (&["li"], &["ul", "ol", "menu"]),
            "td" | "th" => (&["td", "th"], &["tr", "table"]),
            "tr" => (&["tr"], &["table", "thead", "tbody", "tfoot"]),
            "dt" | "dd" => (&["dt", "dd"], &["dl"]),
            _ => (&[], &[]),
        };
        if !targets.is_empty() {
            for pos in (1..stack.len()).rev() {
                let Some(open) = self.tag_name(stack[pos]) else {
                    continue;
                };
                if stops.contains(&open) {
                    break;
                }
                if targets.contains(&open) {
                    self.pop_to(stack, pos, at);
                    break;
                }
            }
        }
        if CLOSES_P.contains(&name) {
            if let Some(&top) = stack.last() {
                if self.tag_name(top) == Some("p") {
                    let last = stack.len() - 1;
                    self.pop_to(stack, last, at);
                }
            }
        }
    }

    fn push_node(&mut self, parent: NodeId, data: NodeData, span: Range<usize>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
            span,
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn new_detached(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
            span: 0..0,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[ROOT].children.is_empty()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id].parent, move |&p| self.nodes[p].parent)
    }

    /// Pre-order walk below `id`, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev());
        }
        out
    }

    /// Elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        self.descendants(ROOT)
            .into_iter()
            .filter_map(move |id| self.element(id).map(|el| (id, el)))
    }

    pub fn has_descendant_named(&self, id: NodeId, name: &str) -> bool {
        self.descendants(id)
            .into_iter()
            .any(|d| self.tag_name(d) == Some(name))
    }

    pub fn render(&self) -> String {
        self.inner_html(ROOT)
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.nodes[id].children {
            self.write_node(child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].data {
            NodeData::Document => {
                for &child in &self.nodes[id].children {
                    self.write_node(child, out);
                }
            }
            NodeData::Text(t) => out.push_str(t),
            NodeData::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            NodeData::Doctype(d) => {
                out.push_str("<!");
                out.push_str(d);
                out.push('>');
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for attr in &el.attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if let Some(value) = &attr.value {
                        out.push_str("=\"");
                        out.push_str(&value.replace('"', "&quot;"));
                        out.push('"');
                    }
                }
                if el.self_closing {
                    out.push_str(" />");
                } else {
                    out.push('>');
                }
                if is_void(&el.name) || el.self_closing {
                    return;
                }
                for &child in &self.nodes[id].children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }

    /// Replaces the children of `id` with the nodes parsed from `html`.
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) {
        let fragment = Document::parse(html);
        for child in std::mem::take(&mut self.nodes[id].children) {
            self.nodes[child].parent = None;
        }
        for &child in fragment.children(ROOT) {
            self.graft(&fragment, child, id);
        }
    }

    fn graft(&mut self, source: &Document, source_id: NodeId, parent: NodeId) {
        let id = self.new_detached(source.nodes[source_id].data.clone());
        self.nodes[id].parent = Some(parent);
        self.nodes[parent].children.push(id);
        for &child in source.children(source_id) {
            self.graft(source, child, id);
        }
    }

    /// Wraps `range` (byte offsets into the raw text) of text node `text_id`
    /// in `wrapper`, splitting the text node. Returns the wrapper id.
    pub fn wrap_text(&mut self, text_id: NodeId, range: Range<usize>, wrapper: Element) -> Option<NodeId> {
        let NodeData::Text(raw) = &self.nodes[text_id].data else {
            return None;
        };
        let raw = raw.clone();
        let before = raw.get(..range.start)?.to_string();
        let inner = raw.get(range.clone())?.to_string();
        let after = raw.get(range.end..)?.to_string();
        let parent = self.nodes[text_id].parent?;
        let index = self.nodes[parent].children.iter().position(|&c| c == text_id)?;

        let mut replacement = Vec::with_capacity(3);
        if !before.is_empty() {
            replacement.push(self.new_detached(NodeData::Text(before)));
        }
        let wrapper_id = self.new_detached(NodeData::Element(wrapper));
        let inner_id = self.new_detached(NodeData::Text(inner));
        self.nodes[inner_id].parent = Some(wrapper_id);
        self.nodes[wrapper_id].children.push(inner_id);
        replacement.push(wrapper_id);
        if !after.is_empty() {
            replacement.push(self.new_detached(NodeData::Text(after)));
        }
        for &node in &replacement {
            self.nodes[node].parent = Some(parent);
        }
        self.nodes[parent].children.splice(index..=index, replacement);
        self.nodes[text_id].parent = None;
        Some(wrapper_id)
    }
}

/// Attribute-safe `<a>` element.
pub fn link_element(href: &str, title: &str) -> Element {
    Element::new("a")
        .with_attr("href", &escape_attr(href))
        .with_attr("title", &escape_attr(title))
}

// ── Tests ──
