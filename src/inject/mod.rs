//! Semantic insertion engine shared by the term and link injectors.
//!
//! The engine owns candidate selection: which elements may absorb an
//! insertion, in what order they are tried. An [`InsertionPolicy`] supplies
//! the unit-specific parts (scoring, presence test, the mutation itself).

pub mod anchor;
pub mod links;
pub mod relevance;
pub mod terms;

use std::cmp::Ordering;

use serde::Serialize;

use crate::html::{heading_level, Document, Element, NodeId, TextIndex};

/// Elements that can absorb an insertion.
pub const CANDIDATE_TAGS: &[&str] = &["p", "li", "td"];

/// No insertion below any of these.
const FORBIDDEN_ANCESTORS: &[&str] = &["a", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "code", "pre"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertionCandidate {
    pub element: NodeId,
    pub tag: String,
    pub section: usize,
    pub score: f64,
    pub position: Position,
}

/// What a policy sees of one candidate element.
pub struct ElementContext<'a> {
    pub doc: &'a Document,
    pub id: NodeId,
    pub element: &'a Element,
    /// Trimmed plain text of the element.
    pub text: &'a str,
    /// Plain-text offset of `text` in the whole document.
    pub offset: usize,
    /// Number of headings before the element.
    pub section: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoCandidate,
    LowRelevance,
    NoAnchor,
    AnchorNotFound,
    TooClose,
    DuplicateAnchor,
    AlreadyLinked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub tag: String,
    pub section: usize,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insertion {
    pub unit: String,
    pub location: Location,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub unit: String,
    pub reason: SkipReason,
}

/// Outcome of one injection pass. Shortfalls land in `failed`, never in an
/// error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionReport {
    pub added: Vec<Insertion>,
    pub failed: Vec<Skipped>,
    pub before_score: u32,
    pub after_score: u32,
}

impl InjectionReport {
    pub fn added_units(&self) -> Vec<&str> {
        self.added.iter().map(|i| i.unit.as_str()).collect()
    }
}

pub trait InsertionPolicy {
    type Unit;

    /// Per-element caps and structural requirements.
    fn accepts(&self, unit: &Self::Unit, ctx: &ElementContext<'_>) -> bool;

    /// The element already mentions the unit.
    fn already_present(&self, _unit: &Self::Unit, _ctx: &ElementContext<'_>) -> bool {
        false
    }

    fn score(&self, unit: &Self::Unit, ctx: &ElementContext<'_>) -> f64;

    fn position(&self, unit: &Self::Unit, ctx: &ElementContext<'_>) -> Position;

    /// Mutates `doc` at `candidate`. An error moves the engine on to the next
    /// candidate.
    fn apply(
        &mut self,
        doc: &mut Document,
        index: &TextIndex,
        unit: &Self::Unit,
        candidate: &InsertionCandidate,
    ) -> Result<(), SkipReason>;
}

#[derive(Debug, Clone)]
pub struct InsertionEngine {
    pub min_chars: usize,
    pub max_chars: usize,
    pub min_score: f64,
}

impl InsertionEngine {
    pub fn new(min_chars: usize, max_chars: usize, min_score: f64) -> Self {
        Self {
            min_chars,
            max_chars,
            min_score,
        }
    }

    /// Ranked candidates for `unit`: best score first, ties in document order.
    pub fn candidates<P: InsertionPolicy>(
        &self,
        doc: &Document,
        index: &TextIndex,
        policy: &P,
        unit: &P::Unit,
    ) -> Vec<InsertionCandidate> {
        let sections = section_map(doc);
        let mut found = Vec::new();

        for (id, element) in doc.elements() {
            if !CANDIDATE_TAGS.contains(&element.name.as_str()) || in_forbidden_context(doc, id) {
                continue;
            }
            let raw = index.text_of(id);
            let text = raw.trim();
            let chars = text.chars().count();
            if chars < self.min_chars || chars > self.max_chars {
                continue;
            }
            let ctx = ElementContext {
                doc,
                id,
                element,
                text,
                offset: index.range(id).start + (raw.len() - raw.trim_start().len()),
                section: sections[id],
            };
            if !policy.accepts(unit, &ctx) || policy.already_present(unit, &ctx) {
                continue;
            }
            let score = policy.score(unit, &ctx);
            if score < self.min_score {
                continue;
            }
            found.push(InsertionCandidate {
                element: id,
                tag: element.name.clone(),
                section: ctx.section,
                score,
                position: policy.position(unit, &ctx),
            });
        }

        found.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        found
    }

    /// Tries candidates best-first until one applies.
    pub fn apply_best<P: InsertionPolicy>(
        &self,
        doc: &mut Document,
        policy: &mut P,
        unit: &P::Unit,
    ) -> Result<InsertionCandidate, SkipReason> {
        let index = TextIndex::build(doc);
        let ranked = self.candidates(doc, &index, policy, unit);
        let mut last_error = SkipReason::NoCandidate;
        for candidate in ranked {
            match policy.apply(doc, &index, unit, &candidate) {
                Ok(()) => return Ok(candidate),
                Err(reason) => last_error = reason,
            }
        }
        Err(last_error)
    }
}

/// The element sits below a link, heading, quote or code block.
pub fn in_forbidden_context(doc: &Document, id: NodeId) -> bool {
    doc.ancestors(id)
        .filter_map(|a| doc.tag_name(a))
        .any(|name| FORBIDDEN_ANCESTORS.contains(&name))
}

/// For every node, how many headings precede it in document order.
pub fn section_map(doc: &Document) -> Vec<usize> {
    let mut map = vec![0; doc.len()];
    let mut seen = 0;
    for id in doc.descendants(crate::html::ROOT) {
        map[id] = seen;
        if doc.tag_name(id).and_then(heading_level).is_some() {
            seen += 1;
        }
    }
    map
}

/// Meaningful lowercase words of `text`, as a set-like list.
pub fn word_set(text: &str) -> Vec<String> {
    let mut words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    words.sort();
    words.dedup();
    words
}

// ── Tests ──
