use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, IdSource, SystemClock};
use crate::coverage::{self, CoverageReport};
use crate::cta;
use crate::error::PipelineError;
use crate::html::{word_count, Document};
use crate::inject::{links, terms, InjectionReport};
use crate::parser::{RecoveringParser, Stage};
use crate::record::{ContentRecord, LinkTarget, Reference, VocabularyTerm};
use crate::sections::{self, Placement, SectionKind};
use crate::settings::Settings;

/// Everything besides the raw model output that one run needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineInputs {
    /// Topic context for link relevance; the record title when absent.
    pub keyword: Option<String>,
    pub terms: Vec<VocabularyTerm>,
    pub links: Vec<LinkTarget>,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub record: ContentRecord,
    pub stage: Option<&'static str>,
    pub coverage: CoverageReport,
    pub term_report: InjectionReport,
    pub link_report: InjectionReport,
    pub faq_placement: Placement,
    pub takeaways_placement: Placement,
    /// Script-driven CTA buttons rewritten as links.
    pub cta_repaired: usize,
}

pub struct Pipeline<C: Clock = SystemClock> {
    settings: Settings,
    parser: RecoveringParser,
    clock: C,
}

impl Pipeline<SystemClock> {
    pub fn new(settings: Settings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> Pipeline<C> {
    pub fn with_clock(settings: Settings, clock: C) -> Self {
        Self {
            parser: RecoveringParser::new(settings.parser.clone()),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Parses raw model output, then post-processes the record.
    pub fn run<R: Rng>(
        &self,
        raw: &str,
        inputs: &PipelineInputs,
        rng: &mut R,
        ids: &mut dyn IdSource,
    ) -> Result<PipelineOutput, PipelineError> {
        let (record, stage) = self.parser.parse_with_stage(raw)?;
        debug!(stage = stage.label(), "parsed model output");
        let mut output = self.process(record, inputs, rng, ids)?;
        output.stage = Some(Stage::label(stage));
        Ok(output)
    }

    /// Post-processes an already parsed record. The record is consumed; the
    /// caller's copy is never touched.
    pub fn process<R: Rng>(
        &self,
        mut record: ContentRecord,
        inputs: &PipelineInputs,
        rng: &mut R,
        ids: &mut dyn IdSource,
    ) -> Result<PipelineOutput, PipelineError> {
        self.validate(&record)?;

        let mut body = record.html_body.clone();
        if self.settings.content.strip_h1 {
            body = sections::strip_h1(&body);
        }
        let cta = cta::repair_cta_links(&body);
        let body = cta.html;

        let mut doc = Document::parse(&body);
        let term_report = terms::inject_terms(&mut doc, &inputs.terms, &self.settings.terms, rng);
        let keyword = inputs
            .keyword
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(&record.title);
        let link_report = links::inject_links(&mut doc, &inputs.links, keyword, &self.settings.links);
        let body = doc.render();

        let faq = sections::canonicalize_faq(&body, &record.faqs, &self.settings.sections, ids);
        let takeaways = sections::canonicalize_takeaways(
            &faq.html,
            &record.key_takeaways,
            &self.settings.sections,
            ids,
        );
        let refs = sections::canonicalize_references(
            &takeaways.html,
            &inputs.references,
            &self.settings.sections,
            &self.clock,
            ids,
        );
        let body = sections::deduplicate(&refs.html, SectionKind::Faq);
        let body = sections::deduplicate(&body, SectionKind::Takeaways);
        let body = sections::deduplicate(&body, SectionKind::References);

        record.word_count = word_count(&body);
        record.html_body = body;
        let coverage = coverage::analyze(&record.html_body, &inputs.terms);

        info!(
            title = %record.title,
            words = record.word_count,
            coverage = coverage.raw_score,
            terms_added = term_report.added.len(),
            links_added = link_report.added.len(),
            "document processed"
        );
        Ok(PipelineOutput {
            record,
            stage: None,
            coverage,
            term_report,
            link_report,
            faq_placement: faq.placement,
            takeaways_placement: takeaways.placement,
            cta_repaired: cta.converted,
        })
    }

    fn validate(&self, record: &ContentRecord) -> Result<(), PipelineError> {
        if record.html_body.trim().is_empty() {
            return Err(PipelineError::MissingRequiredField("htmlContent"));
        }
        if record.title.trim().is_empty() {
            return Err(PipelineError::MissingRequiredField("title"));
        }
        let len = record.html_body.chars().count();
        let min = self.settings.content.min_body_chars;
        if len < min {
            return Err(PipelineError::ContentTooShort { len, min });
        }
        Ok(())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SequentialIds};
    use crate::record::FaqItem;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pipeline() -> Pipeline<FixedClock> {
        Pipeline::with_clock(
            Settings::default(),
            FixedClock(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()),
        )
    }

    fn record(title: &str, body: &str) -> ContentRecord {
        serde_json::from_value(serde_json::json!({ "title": title, "htmlContent": body })).unwrap()
    }

    fn process(record: ContentRecord) -> Result<PipelineOutput, PipelineError> {
        pipeline().process(
            record,
            &PipelineInputs::default(),
            &mut StdRng::seed_from_u64(1),
            &mut SequentialIds::default(),
        )
    }

    #[test]
    fn rejects_missing_fields_and_short_bodies() {
        assert!(matches!(
            process(record("T", "  ")),
            Err(PipelineError::MissingRequiredField("htmlContent"))
        ));
        assert!(matches!(
            process(record("", "<p>x</p>")),
            Err(PipelineError::MissingRequiredField("title"))
        ));
        assert!(matches!(
            process(record("T", "<p>short</p>")),
            Err(PipelineError::ContentTooShort { len: 12, min: 2000 })
        ));
    }

    #[test]
    fn strips_h1_and_recounts_words() {
        let body = format!("<h1>Title</h1>\n<p>{}</p>", "word ".repeat(500));
        let out = process(record("Title", &body)).unwrap();
        assert!(!out.record.html_body.contains("<h1>"));
        assert_eq!(out.record.word_count, 500);
        assert_eq!(out.faq_placement, Placement::Unchanged);
        assert_eq!(out.stage, None);
    }

    #[test]
    fn run_reports_parse_stage() {
        let body = format!("<p>{}</p>", "steady ".repeat(400));
        let raw = format!(
            "```json\n{}\n```",
            serde_json::json!({
                "title": "Steady",
                "htmlContent": body,
                "faqs": [{"question": "Why?", "answer": "Because."}],
            })
        );
        let out = pipeline()
            .run(
                &raw,
                &PipelineInputs::default(),
                &mut StdRng::seed_from_u64(1),
                &mut SequentialIds::default(),
            )
            .unwrap();
        assert_eq!(out.stage, Some("direct"));
        assert_eq!(out.faq_placement, Placement::Append);
        assert!(out.record.html_body.ends_with("</section>"));
    }

    #[test]
    fn takeaways_and_cta_buttons_are_handled() {
        let body = format!(
            "<p>{}</p>\n<button onclick=\"window.location.href='/start'\">Start today</button>",
            "steady ".repeat(400)
        );
        let mut rec = record("Steady", &body);
        rec.faqs = vec![FaqItem {
            question: "Why?".into(),
            answer: "Because.".into(),
        }];
        rec.key_takeaways = vec!["Stay steady.".into()];
        let out = process(rec).unwrap();
        let html = &out.record.html_body;

        assert_eq!(out.cta_repaired, 1);
        assert!(html.contains(r#"<a href="/start" class="wp-opt-cta-button">Start today</a>"#));
        assert!(!html.contains("<button"));
        assert_eq!(out.takeaways_placement, Placement::BeforeFaq);
        assert!(html.find("Key Takeaways").unwrap() < html.find("wp-opt-faq-").unwrap());
    }
}
