use regex::Regex;
use serde::Serialize;

use crate::html::{Document, TextIndex};
use crate::record::VocabularyTerm;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermUsage {
    pub term: VocabularyTerm,
    pub count: usize,
    /// Byte offsets into the plain text.
    pub positions: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub raw_score: u32,
    pub weighted_score: u32,
    pub used_terms: Vec<TermUsage>,
    pub missing_terms: Vec<VocabularyTerm>,
    pub critical_missing: Vec<VocabularyTerm>,
    pub header_missing: Vec<VocabularyTerm>,
    pub body_missing: Vec<VocabularyTerm>,
}

impl CoverageReport {
    fn complete() -> Self {
        Self {
            raw_score: 100,
            weighted_score: 100,
            used_terms: Vec::new(),
            missing_terms: Vec::new(),
            critical_missing: Vec::new(),
            header_missing: Vec::new(),
            body_missing: Vec::new(),
        }
    }
}

/// Case-insensitive pattern for `term`. Word boundaries are asserted only on
/// sides that begin or end with a word character.
pub fn term_pattern(term: &str) -> Option<Regex> {
    let term = term.trim();
    let first = term.chars().next()?;
    let last = term.chars().last()?;
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut pattern = String::from("(?i)");
    if is_word(first) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(term));
    if is_word(last) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern).ok()
}

pub fn analyze(html: &str, terms: &[VocabularyTerm]) -> CoverageReport {
    if html.trim().is_empty() {
        return CoverageReport::complete();
    }
    analyze_document(&Document::parse(html), terms)
}

pub fn analyze_document(doc: &Document, terms: &[VocabularyTerm]) -> CoverageReport {
    analyze_text(TextIndex::build(doc).text(), terms)
}

/// Scores `terms` against already extracted plain text.
pub fn analyze_text(text: &str, terms: &[VocabularyTerm]) -> CoverageReport {
    if text.trim().is_empty() || terms.is_empty() {
        return CoverageReport::complete();
    }

    let mut used_terms = Vec::new();
    let mut missing_terms = Vec::new();
    let mut total_weight = 0u32;
    let mut used_weight = 0u32;

    for term in terms {
        let weight = term.weight();
        total_weight += weight;
        let positions: Vec<usize> = term_pattern(&term.text)
            .map(|re| re.find_iter(text).map(|m| m.start()).collect())
            .unwrap_or_default();
        if positions.is_empty() {
            missing_terms.push(term.clone());
        } else {
            used_weight += weight;
            used_terms.push(TermUsage {
                term: term.clone(),
                count: positions.len(),
                positions,
            });
        }
    }

    let percent = |part: u32, whole: u32| {
        if whole == 0 {
            100
        } else {
            (f64::from(part) / f64::from(whole) * 100.0).round() as u32
        }
    };
    let raw_score = percent(used_terms.len() as u32, terms.len() as u32);
    let weighted_score = percent(used_weight, total_weight);

    let bucket = |keep: fn(&VocabularyTerm) -> bool| -> Vec<VocabularyTerm> {
        missing_terms.iter().filter(|t| keep(t)).cloned().collect()
    };
    let critical_missing = bucket(|t| t.is_critical());
    let header_missing = bucket(|t| t.kind.is_heading());
    let body_missing = bucket(|t| !t.kind.is_heading());

    CoverageReport {
        raw_score,
        weighted_score,
        used_terms,
        missing_terms,
        critical_missing,
        header_missing,
        body_missing,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TermKind;
    use pretty_assertions::assert_eq;

    fn vocabulary() -> Vec<VocabularyTerm> {
        vec![
            VocabularyTerm::new("protein timing", TermKind::Header, 90),
            VocabularyTerm::new("muscle recovery", TermKind::Basic, 85),
            VocabularyTerm::new("hydration", TermKind::Basic, 40),
            VocabularyTerm::new("leucine threshold", TermKind::Basic, 95),
            VocabularyTerm::new("anabolic window", TermKind::Title, 80),
            VocabularyTerm::new("casein", TermKind::Extended, 30),
            VocabularyTerm::new("creatine", TermKind::Extended, 30),
            VocabularyTerm::new("glycogen", TermKind::Extended, 30),
            VocabularyTerm::new("electrolytes", TermKind::Extended, 20),
            VocabularyTerm::new("sleep quality", TermKind::Extended, 20),
        ]
    }

    const BODY: &str = "<h2>Protein Timing Basics</h2>\
        <p>Good protein timing supports <strong>muscle recovery</strong> after training.</p>\
        <p>Hydration matters too, but dehydration is not a term match.</p>";

    #[test]
    fn scores_three_of_ten() {
        let report = analyze(BODY, &vocabulary());
        assert_eq!(report.raw_score, 30);
        // (90 + 85 + 40) / 520
        assert_eq!(report.weighted_score, 41);
        assert_eq!(report.missing_terms.len(), 7);
        let critical: Vec<_> = report.critical_missing.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(critical, vec!["leucine threshold", "anabolic window"]);
        assert_eq!(report.header_missing.len(), 1);
        assert_eq!(report.body_missing.len(), 6);
    }

    #[test]
    fn counts_and_positions_are_case_insensitive() {
        let report = analyze(BODY, &vocabulary());
        let timing = &report.used_terms[0];
        assert_eq!(timing.count, 2);
        let text = TextIndex::build(&Document::parse(BODY)).text().to_string();
        assert_eq!(&text[timing.positions[0]..timing.positions[0] + 14], "Protein Timing");
        let hydration = report.used_terms.iter().find(|u| u.term.text == "hydration").unwrap();
        assert_eq!(hydration.count, 1);
    }

    #[test]
    fn boundaries_only_on_word_edges() {
        let terms = vec![VocabularyTerm::new("c++", TermKind::Basic, 50)];
        assert_eq!(analyze_text("we write c++ daily", &terms).raw_score, 100);
        assert_eq!(analyze_text("abc++ is different", &terms).raw_score, 0);
    }

    #[test]
    fn empty_inputs_are_fully_covered() {
        assert_eq!(analyze("", &vocabulary()).raw_score, 100);
        assert_eq!(analyze(BODY, &[]).weighted_score, 100);
    }

    #[test]
    fn identical_input_identical_report() {
        assert_eq!(analyze(BODY, &vocabulary()), analyze(BODY, &vocabulary()));
    }
}
