//! Detection of existing FAQ and reference blocks through an ordered list of
//! matcher strategies.

use std::ops::Range;

use serde::Serialize;

use crate::html::{heading_level, Document, Element, NodeData, NodeId, TextIndex, ROOT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Faq,
    References,
    Takeaways,
}

impl SectionKind {
    pub fn matchers(self) -> &'static [Matcher] {
        match self {
            SectionKind::Faq => FAQ_MATCHERS,
            SectionKind::References => REFERENCE_MATCHERS,
            SectionKind::Takeaways => TAKEAWAY_MATCHERS,
        }
    }

    /// Markup that marks one rendered item of this kind.
    fn item_marker(self) -> &'static [&'static str] {
        match self {
            SectionKind::Faq => &[r#"class="faq-question""#, r#"class="faq-lbl""#, "faq-itm"],
            SectionKind::References => &[r#"class="ref-card""#],
            SectionKind::Takeaways => &[r#"class="takeaway-item""#],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// One of `tags` whose class or id contains one of `needles`.
    ClassOrId {
        tags: &'static [&'static str],
        needles: &'static [&'static str],
    },
    /// Any element with a schema.org `itemtype` of this type.
    SchemaType(&'static str),
    /// A `<style>` block mentioning one of these class prefixes.
    StyleBlock(&'static [&'static str]),
    /// A heading whose text contains one of `phrases`, or is exactly one of
    /// them when `whole` is set; the block runs until the next heading of the
    /// same or higher rank.
    Heading {
        levels: &'static [u8],
        phrases: &'static [&'static str],
        whole: bool,
    },
}

const FAQ_MATCHERS: &[Matcher] = &[
    Matcher::ClassOrId {
        tags: &["section"],
        needles: &["faq"],
    },
    Matcher::ClassOrId {
        tags: &["div", "aside"],
        needles: &["faq-section", "faq-accordion", "faq-container", "wp-opt-faq"],
    },
    Matcher::SchemaType("FAQPage"),
    Matcher::StyleBlock(&["wp-opt-faq-", "faq-section-"]),
    Matcher::Heading {
        levels: &[2, 3],
        phrases: &["frequently asked", "faq", "faqs"],
        whole: false,
    },
];

const REFERENCE_MATCHERS: &[Matcher] = &[
    Matcher::ClassOrId {
        tags: &["section", "div", "aside"],
        needles: &["references", "ref-accordion", "wp-opt-references", "citations", "sources-section"],
    },
    Matcher::StyleBlock(&["ref-accordion-"]),
    Matcher::Heading {
        levels: &[2, 3],
        phrases: &[
            "references",
            "sources",
            "sources and references",
            "references and sources",
            "citations",
            "bibliography",
            "works cited",
        ],
        whole: true,
    },
];

const TAKEAWAY_MATCHERS: &[Matcher] = &[
    Matcher::ClassOrId {
        tags: &["div", "aside", "section"],
        needles: &["key-takeaways", "wp-opt-takeaways"],
    },
    Matcher::Heading {
        levels: &[2, 3],
        phrases: &["key takeaways", "takeaways", "key points"],
        whole: true,
    },
];

impl Matcher {
    pub fn name(&self) -> &'static str {
        match self {
            Matcher::ClassOrId { .. } => "class_or_id",
            Matcher::SchemaType(_) => "schema_type",
            Matcher::StyleBlock(_) => "style_block",
            Matcher::Heading { .. } => "heading",
        }
    }

    /// Structural match on a single element. Headings are matched by
    /// [`Matcher::heading_matches`].
    pub fn matches(&self, doc: &Document, id: NodeId, el: &Element) -> bool {
        match self {
            Matcher::ClassOrId { tags, needles } => {
                tags.contains(&el.name.as_str())
                    && ["class", "id"].iter().any(|attr| {
                        el.attr(attr)
                            .map(str::to_ascii_lowercase)
                            .is_some_and(|v| needles.iter().any(|n| v.contains(n)))
                    })
            }
            Matcher::SchemaType(schema) => el.attr("itemtype").is_some_and(|t| {
                let t = t.trim_end_matches('/');
                t.strip_suffix(schema)
                    .is_some_and(|rest| rest.ends_with("schema.org/"))
            }),
            Matcher::StyleBlock(prefixes) => {
                el.name == "style"
                    && doc.children(id).iter().any(|&c| match &doc.node(c).data {
                        NodeData::Text(css) => prefixes.iter().any(|p| css.contains(p)),
                        _ => false,
                    })
            }
            Matcher::Heading { .. } => false,
        }
    }

    pub fn heading_matches(&self, el: &Element, text: &str) -> bool {
        let Matcher::Heading { levels, phrases, whole } = self else {
            return false;
        };
        let Some(level) = heading_level(&el.name) else {
            return false;
        };
        if !levels.contains(&level) {
            return false;
        }
        if *whole {
            let text = normalize_heading(text);
            phrases.iter().any(|p| text == *p)
        } else {
            let text = text.to_lowercase();
            phrases.iter().any(|p| contains_phrase(&text, p))
        }
    }
}

/// Lowercase words of a heading, `&` spelled out, punctuation dropped.
fn normalize_heading(text: &str) -> String {
    text.to_lowercase()
        .replace('&', " and ")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `phrase` occurs in `text` with no letters or digits glued to either side.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// One detected block. `span` is a byte range into the scanned HTML.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDescriptor {
    pub kind: SectionKind,
    pub span: Range<usize>,
    pub matcher: &'static str,
    pub is_canonical_quality: bool,
}

/// Blocks of `kind` in document order. `expected_items` is the size of the
/// canonical list the blocks are judged against.
pub fn detect(html: &str, kind: SectionKind, expected_items: usize, ratio: f64) -> Vec<SectionDescriptor> {
    let doc = Document::parse(html);
    let index = TextIndex::build(&doc);
    let mut spans = Vec::new();
    walk(&doc, &index, ROOT, kind, &mut spans);

    spans
        .into_iter()
        .map(|(span, matcher)| {
            let block = &html[span.clone()];
            DescriptorBuilder { kind, block, expected_items, ratio }.build(span, matcher)
        })
        .collect()
}

struct DescriptorBuilder<'a> {
    kind: SectionKind,
    block: &'a str,
    expected_items: usize,
    ratio: f64,
}

impl DescriptorBuilder<'_> {
    fn build(self, span: Range<usize>, matcher: &'static str) -> SectionDescriptor {
        let premium = self.block.contains("linear-gradient") && self.block.contains("border-radius");
        let items: usize = self
            .kind
            .item_marker()
            .iter()
            .map(|m| self.block.matches(m).count())
            .sum();
        SectionDescriptor {
            kind: self.kind,
            span,
            matcher,
            is_canonical_quality: premium && items as f64 >= self.ratio * self.expected_items as f64,
        }
    }
}

fn walk(
    doc: &Document,
    index: &TextIndex,
    parent: NodeId,
    kind: SectionKind,
    out: &mut Vec<(Range<usize>, &'static str)>,
) {
    let children = doc.children(parent);
    let mut i = 0;
    while i < children.len() {
        let id = children[i];
        let Some(el) = doc.element(id) else {
            i += 1;
            continue;
        };

        if let Some(m) = kind.matchers().iter().find(|m| m.matches(doc, id, el)) {
            out.push((doc.node(id).span.clone(), m.name()));
            i += 1;
            continue;
        }

        let heading = kind
            .matchers()
            .iter()
            .find(|m| m.heading_matches(el, index.text_of(id)));
        if let (Some(m), Some(level)) = (heading, heading_level(&el.name)) {
            let end = heading_run_end(doc, children, i, level);
            let span = doc.node(id).span.start..doc.node(children[end - 1]).span.end;
            out.push((span, m.name()));
            i = end;
            continue;
        }

        walk(doc, index, id, kind, out);
        i += 1;
    }
}

/// Index one past the last sibling belonging to the heading at `start`.
fn heading_run_end(doc: &Document, siblings: &[NodeId], start: usize, level: u8) -> usize {
    siblings[start + 1..]
        .iter()
        .position(|&s| match doc.tag_name(s) {
            Some("section") => true,
            Some(name) => heading_level(name).is_some_and(|l| l <= level),
            None => false,
        })
        .map(|offset| start + 1 + offset)
        .unwrap_or(siblings.len())
}

// ── Tests ──
