pub mod heal;
pub mod salvage;
pub mod scan;

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::record::ContentRecord;
use crate::settings::ParserSettings;

/// The stage that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Direct,
    Delimited,
    Healed,
    Salvaged,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Direct => "direct",
            Stage::Delimited => "delimited",
            Stage::Healed => "healed",
            Stage::Salvaged => "salvaged",
        }
    }
}

/// Staged recovery: fence strip → direct → delimited object → healed → salvage.
#[derive(Debug, Clone, Default)]
pub struct RecoveringParser {
    settings: ParserSettings,
}

impl RecoveringParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }

    pub fn parse(&self, raw: &str) -> Result<ContentRecord, PipelineError> {
        self.parse_with_stage(raw).map(|(record, _)| record)
    }

    pub fn parse_with_stage(&self, raw: &str) -> Result<(ContentRecord, Stage), PipelineError> {
        let text = strip_fences(raw);
        let len = text.chars().count();
        if len < self.settings.min_response_chars {
            return Err(PipelineError::ContentTooShort {
                len,
                min: self.settings.min_response_chars,
            });
        }

        if let Some(record) = accept(text) {
            debug!("direct parse succeeded");
            return Ok((record, Stage::Direct));
        }

        let candidate = match scan::object_span(text) {
            Some(span) => &text[span],
            None => text,
        };
        if let Some(record) = accept(candidate) {
            debug!("delimited object parsed");
            return Ok((record, Stage::Delimited));
        }

        let healed = heal::heal(candidate, self.settings.trim_threshold);
        if let Some(record) = accept(&healed) {
            info!(
                verified = record.structure_verified,
                "recovered record after healing"
            );
            return Ok((record, Stage::Healed));
        }

        if let Some(record) = salvage_either(&healed, candidate, self.settings.min_salvage_body_chars) {
            warn!(
                body_chars = record.html_body.len(),
                "salvaged body by pattern match"
            );
            return Ok((record, Stage::Salvaged));
        }

        warn!("all parse stages failed");
        Err(PipelineError::ParseFailure {
            preview: preview(candidate, self.settings.preview_chars),
        })
    }
}

/// Healing can mangle the body terminator, so the untouched candidate gets a
/// second try.
fn salvage_either(healed: &str, candidate: &str, min_body: usize) -> Option<ContentRecord> {
    salvage::salvage(healed, min_body).or_else(|| salvage::salvage(candidate, min_body))
}

/// A stage succeeds only if it yields a non-empty body.
fn accept(text: &str) -> Option<ContentRecord> {
    serde_json::from_str::<ContentRecord>(text)
        .ok()
        .filter(|record| !record.html_body.trim().is_empty())
}

fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    for fence in ["```json", "```JSON", "```"] {
        if let Some(rest) = text.strip_prefix(fence) {
            text = rest;
            break;
        }
    }
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// First and last `n` characters of `text`.
fn preview(text: &str, n: usize) -> String {
    let count = text.chars().count();
    if count <= n * 2 {
        return text.to_string();
    }
    let head: String = text.chars().take(n).collect();
    let tail: String = text.chars().skip(count - n).collect();
    format!("{}...{}", head, tail)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parser() -> RecoveringParser {
        RecoveringParser::new(ParserSettings::default())
    }

    fn long_body() -> String {
        (1..=12)
            .map(|i| format!("<p>Paragraph {} about protein timing and recovery.</p>", i))
            .collect()
    }

    #[test]
    fn valid_json_equals_direct_deserialization() {
        let raw = format!(
            r#"{{
  "title": "Protein Timing",
  "excerpt": "When to eat {{and}} why",
  "htmlContent": "{}",
  "faqs": [{{"question": "Q?", "answer": "A."}}],
  "schema": {{"@type": "Article"}},
  "wordCount": 120
}}"#,
            long_body()
        );
        let expected: ContentRecord = serde_json::from_str(&raw).unwrap();
        let (record, stage) = parser().parse_with_stage(&raw).unwrap();
        assert_eq!(stage, Stage::Direct);
        assert_eq!(record, expected);
    }

    #[test]
    fn fenced_payload_with_prose_is_delimited() {
        let raw = format!(
            "```json\nHere you go: {{\"title\":\"T\",\"htmlContent\":\"{}\"}} hope this helps\n```",
            long_body()
        );
        let (record, stage) = parser().parse_with_stage(&raw).unwrap();
        assert_eq!(stage, Stage::Delimited);
        assert_eq!(record.title, "T");
    }

    #[test]
    fn body_truncated_mid_tag_ends_at_last_closing_tag() {
        let raw = format!(
            r#"{{"title":"Protein Timing","slug":"protein-timing","htmlContent":"{}<p>Cut off here</p"#,
            long_body()
        );
        let (record, stage) = parser().parse_with_stage(&raw).unwrap();
        assert_eq!(stage, Stage::Healed);
        assert_eq!(record.html_body, long_body());
        assert!(!record.structure_verified);
        assert!(record.faqs.is_empty());
        assert_eq!(record.slug, "protein-timing");
    }

    #[test]
    fn truncated_faq_list_keeps_complete_entries() {
        let raw = format!(
            r#"{{"title":"T","htmlContent":"{}","faqs":[{{"question":"Q1","answer":"A1"}},{{"question":"Q2","ans"#,
            long_body()
        );
        let record = parser().parse(&raw).unwrap();
        assert_eq!(record.faqs.len(), 1);
        assert_eq!(record.faqs[0].answer, "A1");
    }

    #[test]
    fn bare_keys_and_raw_newlines_are_healed() {
        let raw = format!(
            "{{title: \"T\", htmlContent: \"{}\n<p>tail</p>\", faqs: [],}}",
            long_body()
        );
        let record = parser().parse(&raw).unwrap();
        assert!(record.html_body.ends_with("\n<p>tail</p>"));
        assert!(record.structure_verified);
    }

    #[test]
    fn raw_quotes_in_body_fall_through_to_salvage() {
        let body = format!("{}{}", long_body(), long_body());
        let raw = format!(
            r#"{{"title":"Quotes","slug":"quotes","htmlContent":"{}<p>He said "stop", then left.</p>","faqs":[{{"question":"Q1","ans"#,
            body
        );
        let (record, stage) = parser().parse_with_stage(&raw).unwrap();
        assert_eq!(stage, Stage::Salvaged);
        assert_eq!(record.title, "Quotes");
        assert_eq!(
            record.html_body,
            format!(r#"{}<p>He said "stop", then left.</p>"#, body)
        );
        assert!(record.faqs.is_empty());
        assert!(!record.structure_verified);
    }

    #[test]
    fn salvage_retries_the_unhealed_candidate() {
        let body = "<p>recovered paragraph</p>".repeat(50);
        let candidate = format!(r#"{{"title":"T","htmlContent":"{}"}}"#, body);
        let healed = r#"{"title":"T"}"#;
        let record = salvage_either(healed, &candidate, 1000).unwrap();
        assert_eq!(record.html_body, body);
        assert!(salvage_either(healed, healed, 1000).is_none());
    }

    #[test]
    fn short_response_is_rejected() {
        let err = parser().parse("```json\n{}\n```").unwrap_err();
        assert!(matches!(err, PipelineError::ContentTooShort { len: 2, .. }));
    }

    #[test]
    fn hopeless_input_fails_with_bounded_preview() {
        let raw = format!("{{\"title\": {}", "x".repeat(1000));
        let shown = match parser().parse(&raw) {
            Err(PipelineError::ParseFailure { preview }) => preview,
            other => panic!("expected parse failure, got {:?}", other),
        };
        assert_eq!(shown.chars().count(), 403);
        assert!(shown.starts_with("{\"title\": xxx"));
    }
}
