//! Internal-link augmentation with synthesized anchor text, section caps and
//! a minimum distance between links.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::{debug, info};

use crate::html::{link_element, Document, NodeId, TextIndex};
use crate::record::LinkTarget;
use crate::settings::LinkSettings;

use super::{
    anchor, in_forbidden_context, relevance, section_map, word_set, ElementContext,
    InjectionReport, InsertionCandidate, InsertionEngine, InsertionPolicy, Insertion, Location,
    Position, SkipReason, Skipped,
};

/// An element must contain at least this share of the title's meaningful words.
const MIN_TITLE_OVERLAP: f64 = 0.5;

/// Leading title words the fallback pass looks for.
const FALLBACK_LEAD_WORDS: usize = 3;

pub struct PreparedTarget {
    pub target: LinkTarget,
    pub anchor: String,
    pub relevance: f64,
    anchor_re: Regex,
    title_words: Vec<String>,
    lead_re: Option<Regex>,
}

impl PreparedTarget {
    /// Scores and prepares `target`, or says why it cannot be linked.
    pub fn new(target: &LinkTarget, context: &str, min_relevance: f64) -> Result<Self, SkipReason> {
        let relevance = relevance::score(target, context).total;
        if relevance < min_relevance {
            return Err(SkipReason::LowRelevance);
        }
        let anchor = anchor::synthesize(&target.title).ok_or(SkipReason::NoAnchor)?;
        let anchor_re = anchor::pattern(&anchor).ok_or(SkipReason::NoAnchor)?;
        let lead: Vec<String> = anchor::title_words(&target.title)
            .into_iter()
            .take(FALLBACK_LEAD_WORDS)
            .collect();
        let lead = lead.join(" ");
        let lead_re = if anchor::is_acceptable(&lead) {
            anchor::pattern(&lead)
        } else {
            None
        };
        Ok(Self {
            target: target.clone(),
            anchor,
            relevance,
            anchor_re,
            title_words: anchor::meaningful_words(&target.title),
            lead_re,
        })
    }
}

struct LinkPolicy<'s> {
    settings: &'s LinkSettings,
    /// Plain-text offsets of every anchor placed in this pass.
    placed: Vec<usize>,
    /// Links per section, seeded with the ones already in the body.
    per_section: HashMap<usize, usize>,
}

impl LinkPolicy<'_> {
    fn section_full(&self, section: usize) -> bool {
        self.per_section.get(&section).copied().unwrap_or(0) >= self.settings.max_per_section
    }

    fn too_close(&self, offset: usize) -> bool {
        self.placed
            .iter()
            .any(|&p| p.abs_diff(offset) < self.settings.min_distance_chars)
    }

    /// Wraps the first match of `re` inside `element` in a link to `unit`.
    fn place(
        &mut self,
        doc: &mut Document,
        index: &TextIndex,
        element: NodeId,
        section: usize,
        re: &Regex,
        unit: &PreparedTarget,
    ) -> Result<(), SkipReason> {
        let range = index.range(element);
        let (start, node, raw) = re
            .find_iter(&index.text()[range.clone()])
            .find_map(|m| {
                let start = range.start + m.start();
                let (node, raw) = index.locate(start..start + m.len())?;
                own_text(doc, node, element).then_some((start, node, raw))
            })
            .ok_or(SkipReason::AnchorNotFound)?;
        if self.too_close(start) {
            return Err(SkipReason::TooClose);
        }
        doc.wrap_text(node, raw, link_element(&unit.target.url, &unit.anchor))
            .ok_or(SkipReason::AnchorNotFound)?;
        self.placed.push(start);
        *self.per_section.entry(section).or_insert(0) += 1;
        Ok(())
    }

    /// Forces a link into the first unlinked paragraph that mentions the
    /// target's leading title words, ignoring the length window.
    fn fallback(&mut self, doc: &mut Document, unit: &PreparedTarget) -> Result<Location, SkipReason> {
        let index = TextIndex::build(doc);
        let sections = section_map(doc);
        let lead = unit.lead_re.as_ref().ok_or(SkipReason::NoCandidate)?;
        let paragraphs: Vec<NodeId> = doc
            .elements()
            .filter(|(id, el)| {
                el.name == "p"
                    && !doc.has_descendant_named(*id, "a")
                    && !in_forbidden_context(doc, *id)
                    && !self.section_full(sections[*id])
            })
            .map(|(id, _)| id)
            .collect();

        let mut last_error = SkipReason::NoCandidate;
        for id in paragraphs {
            let text = index.text_of(id);
            if !lead.is_match(text) {
                continue;
            }
            let re = if unit.anchor_re.is_match(text) {
                &unit.anchor_re
            } else {
                lead
            };
            let position = re
                .find(text)
                .map(|m| position_of(m.start(), text.len()))
                .unwrap_or(Position::End);
            match self.place(doc, &index, id, sections[id], re, unit) {
                Ok(()) => {
                    return Ok(Location {
                        tag: "p".to_string(),
                        section: sections[id],
                        position,
                    })
                }
                Err(reason) => last_error = reason,
            }
        }
        Err(last_error)
    }
}

impl InsertionPolicy for LinkPolicy<'_> {
    type Unit = PreparedTarget;

    fn accepts(&self, _: &PreparedTarget, ctx: &ElementContext<'_>) -> bool {
        !ctx.doc.has_descendant_named(ctx.id, "a") && !self.section_full(ctx.section)
    }

    fn score(&self, unit: &PreparedTarget, ctx: &ElementContext<'_>) -> f64 {
        if unit.title_words.is_empty() {
            return 0.0;
        }
        let words = word_set(ctx.text);
        let shared = unit
            .title_words
            .iter()
            .filter(|w| words.binary_search(w).is_ok())
            .count();
        shared as f64 / unit.title_words.len() as f64
    }

    fn position(&self, unit: &PreparedTarget, ctx: &ElementContext<'_>) -> Position {
        unit.anchor_re
            .find(ctx.text)
            .map(|m| position_of(m.start(), ctx.text.len()))
            .unwrap_or(Position::End)
    }

    fn apply(
        &mut self,
        doc: &mut Document,
        index: &TextIndex,
        unit: &PreparedTarget,
        candidate: &InsertionCandidate,
    ) -> Result<(), SkipReason> {
        self.place(doc, index, candidate.element, candidate.section, &unit.anchor_re, unit)
    }
}

/// The text node sits directly in `element`, not inside inline markup such
/// as `<em>` or `<code>`.
fn own_text(doc: &Document, node: NodeId, element: NodeId) -> bool {
    doc.node(node).parent == Some(element) && !in_forbidden_context(doc, node)
}

/// Links already in the body, counted per logical section.
fn existing_per_section(doc: &Document) -> HashMap<usize, usize> {
    let sections = section_map(doc);
    let mut counts = HashMap::new();
    for (id, el) in doc.elements() {
        if el.name == "a" && el.attr("href").is_some() {
            *counts.entry(sections[id]).or_insert(0) += 1;
        }
    }
    counts
}

fn position_of(offset: usize, len: usize) -> Position {
    if offset * 3 < len {
        Position::Start
    } else if offset * 3 > len * 2 {
        Position::End
    } else {
        Position::Middle
    }
}

pub fn link_count(doc: &Document) -> usize {
    doc.elements()
        .filter(|(_, el)| el.name == "a" && el.attr("href").is_some())
        .count()
}

fn already_linked(doc: &Document, url: &str) -> bool {
    let escaped = crate::html::escape_attr(url);
    doc.elements().any(|(_, el)| {
        el.name == "a" && el.attr("href").is_some_and(|href| href == url || href == escaped)
    })
}

/// Places links to the best-fitting `targets` for content about `context`.
pub fn inject_links(
    doc: &mut Document,
    targets: &[LinkTarget],
    context: &str,
    settings: &LinkSettings,
) -> InjectionReport {
    let before = link_count(doc);
    let mut report = InjectionReport {
        before_score: before as u32,
        ..Default::default()
    };

    let mut prepared = Vec::new();
    for target in targets {
        match PreparedTarget::new(target, context, settings.min_relevance) {
            Ok(unit) => prepared.push(unit),
            Err(reason) => report.failed.push(Skipped {
                unit: target.url.clone(),
                reason,
            }),
        }
    }
    prepared.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    let engine = InsertionEngine::new(settings.min_text_chars, settings.max_text_chars, MIN_TITLE_OVERLAP);
    let mut policy = LinkPolicy {
        settings,
        placed: Vec::new(),
        per_section: existing_per_section(doc),
    };
    let mut used_anchors: HashSet<String> = HashSet::new();
    let mut deferred: Vec<(PreparedTarget, SkipReason)> = Vec::new();

    for unit in prepared {
        if report.added.len() >= settings.max_links {
            break;
        }
        if already_linked(doc, &unit.target.url) {
            report.failed.push(Skipped {
                unit: unit.target.url,
                reason: SkipReason::AlreadyLinked,
            });
            continue;
        }
        if used_anchors.contains(&unit.anchor) {
            report.failed.push(Skipped {
                unit: unit.target.url,
                reason: SkipReason::DuplicateAnchor,
            });
            continue;
        }
        match engine.apply_best(doc, &mut policy, &unit) {
            Ok(candidate) => {
                debug!(url = %unit.target.url, anchor = %unit.anchor, "link placed");
                used_anchors.insert(unit.anchor.clone());
                report.added.push(Insertion {
                    unit: unit.target.url,
                    location: Location {
                        tag: candidate.tag,
                        section: candidate.section,
                        position: candidate.position,
                    },
                    score: unit.relevance,
                });
            }
            Err(reason) => deferred.push((unit, reason)),
        }
    }

    for (unit, reason) in deferred {
        let room = report.added.len() < settings.min_links && report.added.len() < settings.max_links;
        let outcome = if room {
            policy.fallback(doc, &unit)
        } else {
            Err(reason)
        };
        match outcome {
            Ok(location) => {
                debug!(url = %unit.target.url, anchor = %unit.anchor, "fallback link placed");
                used_anchors.insert(unit.anchor.clone());
                report.added.push(Insertion {
                    unit: unit.target.url,
                    location,
                    score: unit.relevance,
                });
            }
            Err(fallback_reason) => report.failed.push(Skipped {
                unit: unit.target.url,
                reason: if fallback_reason == SkipReason::NoCandidate {
                    reason
                } else {
                    fallback_reason
                },
            }),
        }
    }

    report.after_score = link_count(doc) as u32;
    info!(
        added = report.added.len(),
        failed = report.failed.len(),
        links = report.after_score,
        "link injection finished"
    );
    report
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::ROOT;
    use pretty_assertions::assert_eq;

    const CONTEXT: &str = "protein timing and creatine loading";

    fn guide() -> LinkTarget {
        LinkTarget::new(
            "/protein-timing-guide",
            "The Complete Guide to Protein Timing for Athletes",
            "protein-timing-guide",
        )
    }

    fn creatine() -> LinkTarget {
        LinkTarget::new(
            "/creatine-loading",
            "Creatine Loading Phase Explained",
            "creatine-loading",
        )
    }

    const GUIDE_P: &str = "<p>Start with the Complete Guide to Protein Timing before changing anything else in your plan.</p>";
    const CREATINE_P: &str = "<p>Beginners often ask whether creatine loading phase explained simply is worth following.</p>";

    fn filler(words: usize) -> String {
        format!("<p>{}</p>", "steady training builds results ".repeat(words / 4))
    }

    fn reasons(report: &InjectionReport) -> Vec<(&str, SkipReason)> {
        report.failed.iter().map(|s| (s.unit.as_str(), s.reason)).collect()
    }

    /// Plain-text start offsets of every link in the document.
    fn link_offsets(doc: &Document) -> Vec<usize> {
        let index = TextIndex::build(doc);
        doc.descendants(ROOT)
            .into_iter()
            .filter(|&id| doc.tag_name(id) == Some("a"))
            .map(|id| index.range(id).start)
            .collect()
    }

    #[test]
    fn links_anchor_keeping_original_casing() {
        let mut doc = Document::parse(&format!("<h2>Timing</h2>{}", GUIDE_P));
        let report = inject_links(&mut doc, &[guide()], CONTEXT, &LinkSettings::default());
        assert_eq!(report.added_units(), vec!["/protein-timing-guide"]);
        assert_eq!(report.before_score, 0);
        assert_eq!(report.after_score, 1);
        assert!(doc.render().contains(
            r#"<a href="/protein-timing-guide" title="complete guide to protein timing">Complete Guide to Protein Timing</a>"#
        ));
    }

    #[test]
    fn second_link_too_close_is_rejected() {
        let mut doc = Document::parse(&format!("<h2>One</h2>{}{}", GUIDE_P, CREATINE_P));
        let report = inject_links(&mut doc, &[guide(), creatine()], CONTEXT, &LinkSettings::default());
        assert_eq!(report.added_units(), vec!["/creatine-loading"]);
        assert_eq!(reasons(&report), vec![("/protein-timing-guide", SkipReason::TooClose)]);
    }

    #[test]
    fn distance_and_section_caps_hold() {
        let settings = LinkSettings {
            min_distance_chars: 200,
            max_per_section: 1,
            ..LinkSettings::default()
        };
        let html = format!(
            "<h2>One</h2>{}{}{}<h2>Two</h2>{}{}",
            GUIDE_P,
            filler(60),
            CREATINE_P,
            filler(60),
            GUIDE_P,
        );
        let mut doc = Document::parse(&html);
        let report = inject_links(&mut doc, &[guide(), creatine()], CONTEXT, &settings);
        assert_eq!(report.added.len(), 2);
        let sections: Vec<usize> = report.added.iter().map(|i| i.location.section).collect();
        assert_eq!(sections, vec![1, 2]);

        let offsets = link_offsets(&doc);
        assert_eq!(offsets.len(), 2);
        assert!(offsets[0].abs_diff(offsets[1]) >= 200);
    }

    #[test]
    fn unusable_targets_are_reported() {
        let mut doc = Document::parse(&format!(
            "<h2>One</h2>{}<p>See <a href=\"/creatine-loading\">this</a>.</p>",
            GUIDE_P
        ));
        let targets = vec![
            creatine(),
            LinkTarget::new("/misc", "Office Party Photos", "misc"),
            LinkTarget::new("/protein-timing", "Protein Timing", "protein-timing"),
        ];
        let report = inject_links(&mut doc, &targets, CONTEXT, &LinkSettings::default());
        assert!(report.added.is_empty());
        let mut failed = reasons(&report);
        failed.sort_by_key(|(unit, _)| *unit);
        assert_eq!(
            failed,
            vec![
                ("/creatine-loading", SkipReason::AlreadyLinked),
                ("/misc", SkipReason::LowRelevance),
                ("/protein-timing", SkipReason::NoAnchor),
            ]
        );
    }

    #[test]
    fn fallback_places_link_in_short_paragraph() {
        let mut doc = Document::parse("<h2>One</h2><p>The complete guide to protein timing.</p>");
        let report = inject_links(&mut doc, &[guide()], CONTEXT, &LinkSettings::default());
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].location.tag, "p");
        let html = doc.render();
        assert!(html.contains(">complete guide to protein timing</a>"));
    }

    #[test]
    fn section_cap_counts_existing_links() {
        let html = format!(
            "<h2>One</h2><p>Read <a href=\"/a\">this</a> and <a href=\"/b\">that</a> first.</p>{}<h2>Two</h2>{}",
            GUIDE_P,
            filler(40),
        );
        let mut doc = Document::parse(&html);
        let report = inject_links(&mut doc, &[guide()], CONTEXT, &LinkSettings::default());
        assert!(report.added.is_empty());
        assert_eq!(report.before_score, 2);
        assert_eq!(report.after_score, 2);
        assert_eq!(existing_per_section(&doc).get(&1), Some(&2));
    }

    #[test]
    fn anchor_inside_inline_markup_is_left_alone() {
        let html = "<h2>One</h2><p>Start with the <em>Complete Guide to Protein Timing</em> before changing anything else in your plan.</p>";
        let mut doc = Document::parse(html);
        let report = inject_links(&mut doc, &[guide()], CONTEXT, &LinkSettings::default());
        assert!(report.added.is_empty());
        assert_eq!(doc.render(), html);

        let html = "<h2>One</h2><p>Skip <code>complete guide to protein timing</code> and open the Complete Guide to Protein Timing for the rest of it.</p>";
        let mut doc = Document::parse(html);
        let report = inject_links(&mut doc, &[guide()], CONTEXT, &LinkSettings::default());
        assert_eq!(report.added.len(), 1);
        let out = doc.render();
        assert!(out.contains("<code>complete guide to protein timing</code>"));
        assert!(out.contains(">Complete Guide to Protein Timing</a> for the rest"));
    }

    #[test]
    fn anchors_are_three_to_six_words() {
        let mut doc = Document::parse(&format!("<h2>One</h2>{}{}{}", GUIDE_P, filler(120), CREATINE_P));
        inject_links(&mut doc, &[guide(), creatine()], CONTEXT, &LinkSettings::default());
        let index = TextIndex::build(&doc);
        let anchors: Vec<usize> = doc
            .descendants(ROOT)
            .into_iter()
            .filter(|&id| doc.tag_name(id) == Some("a"))
            .map(|id| index.text_of(id).split_whitespace().count())
            .collect();
        assert_eq!(anchors.len(), 2);
        assert!(anchors.iter().all(|n| (3..=6).contains(n)));
    }
}
