//! Controlled-vocabulary augmentation: places missing terms into body copy
//! as short phrased sentences until coverage reaches the target.

use std::collections::HashMap;

use rand::Rng;
use tracing::{debug, info};

use crate::coverage::{analyze_document, term_pattern};
use crate::html::{escape_text, Document, NodeId, TextIndex};
use crate::record::VocabularyTerm;
use crate::settings::TermSettings;

use super::anchor::is_meaningful;
use super::{
    word_set, ElementContext, InjectionReport, InsertionCandidate, InsertionEngine,
    InsertionPolicy, Insertion, Location, Position, SkipReason, Skipped,
};

/// Topic clusters: a term touching one cluster word makes the whole cluster
/// count as context for it.
const TERM_CLUSTERS: &[&[&str]] = &[
    &["ranking", "search", "google", "keyword", "optimization", "serp", "traffic"],
    &["writing", "article", "blog", "post", "copy", "text", "words"],
    &["strategy", "campaign", "audience", "conversion", "leads", "funnel"],
    &["wellness", "fitness", "nutrition", "medical", "treatment", "symptoms"],
    &["company", "revenue", "profit", "growth", "market", "industry"],
    &["money", "investment", "budget", "cost", "price", "savings", "roi"],
    &["training", "exercise", "workout", "muscle", "strength", "protein", "recovery"],
];

const CONTEXT_HIT: f64 = 15.0;

/// Phrasing categories; `{term}` is replaced by the bolded term.
const TEMPLATES: &[&[&str]] = &[
    // definition
    &[
        "{term} plays a crucial role here.",
        "Understanding {term} is essential to getting this right.",
        "The concept of {term} ties these points together.",
    ],
    // importance
    &[
        "{term} is particularly important in this context.",
        "Many experts emphasize {term} for exactly this reason.",
        "Focusing on {term} helps ensure consistent results.",
    ],
    // example
    &[
        "A good example of this is {term}.",
        "{term} shows how this works in practice.",
        "Consider how {term} applies to your own situation.",
    ],
    // transition
    &[
        "This relates directly to {term}.",
        "Building on this, it helps to look at {term}.",
    ],
    // expert opinion
    &[
        "Industry experts recommend paying attention to {term}.",
        "Research supports the role of {term} here.",
        "Studies point to {term} as a key factor.",
    ],
];

/// Words whose presence in an element suggests it is on-topic for `term`.
pub fn related_words(term: &str) -> Vec<String> {
    let own: Vec<String> = word_set(term).into_iter().filter(|w| is_meaningful(w)).collect();
    let mut related = own.clone();
    for cluster in TERM_CLUSTERS {
        if cluster.iter().any(|c| own.iter().any(|w| w == c)) {
            related.extend(cluster.iter().map(|c| c.to_string()));
        }
    }
    related.sort();
    related.dedup();
    related
}

/// Renders one sentence mentioning `term`, chosen with `rng`.
pub fn phrase<R: Rng>(term: &str, rng: &mut R) -> String {
    let category = TEMPLATES[rng.gen_range(0..TEMPLATES.len())];
    let template = category[rng.gen_range(0..category.len())];
    let shown = if template.starts_with("{term}") {
        capitalize(term)
    } else {
        term.to_string()
    };
    template.replace("{term}", &format!("<strong>{}</strong>", escape_text(&shown)))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Byte offsets in `html` where a new sentence begins: after `.`, `!` or `?`
/// plus whitespace, never inside a tag.
pub fn sentence_breaks(html: &str) -> Vec<usize> {
    let mut breaks = Vec::new();
    let mut in_tag = false;
    let mut after_stop = false;
    let mut chars = html.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '.' | '!' | '?' => after_stop = true,
            c if c.is_whitespace() && after_stop => {
                while chars.peek().is_some_and(|(_, n)| n.is_whitespace()) {
                    chars.next();
                }
                if let Some(&(next, _)) = chars.peek() {
                    breaks.push(next);
                }
                after_stop = false;
            }
            _ => after_stop = false,
        }
    }
    breaks
}

/// Splices `sentence` into an element's inner HTML.
pub fn splice(inner: &str, sentence: &str, position: Position) -> String {
    let breaks = sentence_breaks(inner);
    match position {
        Position::Start => format!("{} {}", sentence, inner.trim_start()),
        Position::Middle if !breaks.is_empty() => {
            let sentences = breaks.len() + 1;
            let at = breaks[sentences / 2 - 1];
            format!("{} {} {}", inner[..at].trim_end(), sentence, &inner[at..])
        }
        _ => format!("{} {}", inner.trim_end(), sentence),
    }
}

struct TermPolicy<'r, R> {
    per_element_cap: usize,
    counts: HashMap<NodeId, usize>,
    rng: &'r mut R,
}

impl<R: Rng> InsertionPolicy for TermPolicy<'_, R> {
    type Unit = PreparedTerm;

    fn accepts(&self, _: &PreparedTerm, ctx: &ElementContext<'_>) -> bool {
        self.counts.get(&ctx.id).copied().unwrap_or(0) < self.per_element_cap
    }

    fn already_present(&self, unit: &PreparedTerm, ctx: &ElementContext<'_>) -> bool {
        unit.pattern.as_ref().is_some_and(|re| re.is_match(ctx.text))
    }

    fn score(&self, unit: &PreparedTerm, ctx: &ElementContext<'_>) -> f64 {
        let words = word_set(ctx.text);
        let hits = unit
            .related
            .iter()
            .filter(|r| words.binary_search(r).is_ok())
            .count();
        hits as f64 * CONTEXT_HIT
    }

    fn position(&self, _: &PreparedTerm, ctx: &ElementContext<'_>) -> Position {
        let sentences = ctx
            .text
            .split(['.', '!', '?'])
            .filter(|s| s.trim().chars().count() > 20)
            .count();
        if sentences >= 3 {
            Position::Middle
        } else if ctx.text.ends_with(':') {
            Position::Start
        } else {
            Position::End
        }
    }

    fn apply(
        &mut self,
        doc: &mut Document,
        _: &TextIndex,
        unit: &PreparedTerm,
        candidate: &InsertionCandidate,
    ) -> Result<(), SkipReason> {
        let sentence = phrase(&unit.term.text, self.rng);
        let inner = doc.inner_html(candidate.element);
        doc.set_inner_html(candidate.element, &splice(&inner, &sentence, candidate.position));
        *self.counts.entry(candidate.element).or_insert(0) += 1;
        Ok(())
    }
}

struct PreparedTerm {
    term: VocabularyTerm,
    pattern: Option<regex::Regex>,
    related: Vec<String>,
}

/// Critical terms first, then by importance; input order breaks ties.
fn priority_order(mut terms: Vec<VocabularyTerm>) -> Vec<VocabularyTerm> {
    terms.sort_by(|a, b| {
        b.is_critical()
            .cmp(&a.is_critical())
            .then_with(|| b.weight().cmp(&a.weight()))
    });
    terms
}

pub fn inject_terms<R: Rng>(
    doc: &mut Document,
    terms: &[VocabularyTerm],
    settings: &TermSettings,
    rng: &mut R,
) -> InjectionReport {
    let initial = analyze_document(doc, terms);
    let mut report = InjectionReport {
        before_score: initial.raw_score,
        after_score: initial.raw_score,
        ..Default::default()
    };
    if initial.raw_score >= settings.target_coverage {
        debug!(coverage = initial.raw_score, "coverage already on target");
        return report;
    }

    let engine = InsertionEngine::new(
        settings.min_text_chars,
        settings.max_text_chars,
        settings.min_context_score,
    );
    let mut policy = TermPolicy {
        per_element_cap: settings.per_element_cap,
        counts: HashMap::new(),
        rng,
    };

    for term in priority_order(initial.missing_terms) {
        if report.added.len() >= settings.max_insertions {
            break;
        }
        if analyze_document(doc, terms).raw_score >= settings.target_coverage {
            break;
        }
        let unit = PreparedTerm {
            pattern: term_pattern(&term.text),
            related: related_words(&term.text),
            term,
        };
        match engine.apply_best(doc, &mut policy, &unit) {
            Ok(candidate) => {
                debug!(term = %unit.term.text, tag = %candidate.tag, score = candidate.score, "term inserted");
                report.added.push(Insertion {
                    unit: unit.term.text,
                    location: Location {
                        tag: candidate.tag,
                        section: candidate.section,
                        position: candidate.position,
                    },
                    score: candidate.score,
                });
            }
            Err(reason) => report.failed.push(Skipped {
                unit: unit.term.text,
                reason,
            }),
        }
    }

    report.after_score = analyze_document(doc, terms).raw_score;
    info!(
        added = report.added.len(),
        failed = report.failed.len(),
        before = report.before_score,
        after = report.after_score,
        "term injection finished"
    );
    report
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::analyze;
    use crate::record::TermKind;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DOC: &str = "<h2>Protein timing</h2>\
        <p>Protein timing matters for muscle recovery. Most lifters underestimate how much the leucine threshold \
        of each meal matters. Spread intake across the day. The anabolic window is wider than gym lore suggests.</p>\
        <p>Training hard without enough protein slows recovery, and the muscle you build depends on what you eat afterwards.</p>\
        <p>Short note.</p>";

    fn settings() -> TermSettings {
        TermSettings::default()
    }

    #[test]
    fn related_words_pull_in_clusters() {
        let related = related_words("muscle protein synthesis");
        assert!(related.contains(&"training".to_string()));
        assert!(related.contains(&"synthesis".to_string()));
        assert!(!related.contains(&"revenue".to_string()));
    }

    #[test]
    fn phrase_is_reproducible_for_a_seed() {
        let a = phrase("creatine", &mut StdRng::seed_from_u64(3));
        let b = phrase("creatine", &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert!(a.to_lowercase().contains("<strong>creatine</strong>"));
        assert!(a.ends_with('.'));
    }

    #[test]
    fn sentence_breaks_skip_tags() {
        let html = r#"One. <a title="x. y">Two</a>! Three? Four"#;
        let breaks = sentence_breaks(html);
        let starts: Vec<&str> = breaks.iter().map(|&b| &html[b..b + 3]).collect();
        assert_eq!(starts, vec!["<a ", "Thr", "Fou"]);
    }

    #[test]
    fn splice_positions() {
        let inner = "A one. B two. C three. D four.";
        assert_eq!(splice(inner, "X.", Position::Middle), "A one. B two. X. C three. D four.");
        assert_eq!(splice(inner, "X.", Position::Start), "X. A one. B two. C three. D four.");
        assert_eq!(splice(inner, "X.", Position::End), "A one. B two. C three. D four. X.");
        assert_eq!(splice("Solo", "X.", Position::Middle), "Solo X.");
    }

    #[test]
    fn missing_term_becomes_present() {
        let terms = vec![
            VocabularyTerm::new("protein timing", TermKind::Header, 90),
            VocabularyTerm::new("muscle protein synthesis", TermKind::Basic, 85),
        ];
        let mut doc = Document::parse(DOC);
        let before = analyze(&doc.render(), &terms);
        assert_eq!(before.used_terms.len(), 1);

        let mut rng = StdRng::seed_from_u64(42);
        let report = inject_terms(&mut doc, &terms, &settings(), &mut rng);
        assert_eq!(report.added_units(), vec!["muscle protein synthesis"]);
        assert_eq!(report.before_score, 50);
        assert_eq!(report.after_score, 100);

        let after = analyze(&doc.render(), &terms);
        assert_eq!(after.used_terms.len(), before.used_terms.len() + 1);
        assert!(after.missing_terms.is_empty());
    }

    #[test]
    fn critical_terms_go_first_and_unplaceable_terms_fail() {
        let terms = vec![
            VocabularyTerm::new("protein timing", TermKind::Header, 90),
            VocabularyTerm::new("retirement savings", TermKind::Basic, 40),
            VocabularyTerm::new("leucine threshold", TermKind::Basic, 95),
            VocabularyTerm::new("anabolic window", TermKind::Title, 80),
        ];
        let mut doc = Document::parse(
            &DOC.replace("the leucine threshold", "the amino acid content")
                .replace("The anabolic window", "The timing window"),
        );
        let mut rng = StdRng::seed_from_u64(7);
        let report = inject_terms(&mut doc, &terms, &settings(), &mut rng);
        assert_eq!(report.added_units(), vec!["anabolic window"]);
        let failed: Vec<_> = report.failed.iter().map(|s| (s.unit.as_str(), s.reason)).collect();
        assert_eq!(
            failed,
            vec![
                ("leucine threshold", SkipReason::NoCandidate),
                ("retirement savings", SkipReason::NoCandidate),
            ]
        );
    }

    #[test]
    fn per_element_cap_is_respected() {
        let terms: Vec<_> = ["protein powder", "protein bars", "protein shakes"]
            .iter()
            .map(|t| VocabularyTerm::new(*t, TermKind::Basic, 50))
            .collect();
        let mut doc = Document::parse(
            "<p>Protein is the building block of muscle, and most athletes need more of it than they think they do.</p>",
        );
        let mut rng = StdRng::seed_from_u64(1);
        let report = inject_terms(&mut doc, &terms, &settings(), &mut rng);
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.failed[0].reason, SkipReason::NoCandidate);
    }
}
