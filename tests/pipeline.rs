use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use content_refinery::clock::{FixedClock, SequentialIds};
use content_refinery::sections::{detect, Placement, SectionKind};
use content_refinery::{
    ContentRecord, FaqItem, LinkTarget, Pipeline, PipelineInputs, Reference, Settings, TermKind,
    VocabularyTerm,
};

const BODY: &str = "<h2>Why timing matters</h2>\
<p>Protein timing is the practice of spreading intake around your sessions. Muscle recovery depends on a steady \
amino acid supply across the day, and meal frequency shapes how evenly that supply arrives.</p>\
<p>Lifters who train early often skip breakfast, which leaves the body short on fuel. A small snack before the \
workout makes the session feel easier. It also supports the hard work that follows in the gym.</p>\
<h2>Building the plan</h2>\
<p>Start with total daily intake, then distribute it across three or four meals. Athletes with two sessions a day \
need a little more structure than everyone else, especially around the second workout.</p>\
<p>For a deeper dive, our Complete Guide to Protein Timing covers dosing for endurance and power sports alike.</p>";

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.content.min_body_chars = 200;
    settings
}

fn pipeline_with(settings: Settings) -> Pipeline<FixedClock> {
    Pipeline::with_clock(settings, FixedClock(NaiveDate::from_ymd_opt(2025, 12, 2).unwrap()))
}

fn pipeline() -> Pipeline<FixedClock> {
    pipeline_with(settings())
}

fn record(body: &str, faqs: Vec<FaqItem>) -> ContentRecord {
    serde_json::from_value(serde_json::json!({
        "title": "Protein Timing for Lifters",
        "slug": "protein-timing-for-lifters",
        "htmlContent": body,
        "faqs": faqs,
    }))
    .unwrap()
}

fn vocabulary() -> Vec<VocabularyTerm> {
    [
        ("protein timing", TermKind::Header, 90),
        ("muscle recovery", TermKind::Basic, 85),
        ("meal frequency", TermKind::Extended, 40),
        ("protein synthesis", TermKind::Basic, 90),
        ("strength training", TermKind::Basic, 80),
        ("sleep quality", TermKind::Extended, 30),
        ("hydration", TermKind::Extended, 20),
        ("creatine loading", TermKind::Extended, 30),
        ("rest days", TermKind::Extended, 25),
        ("progressive overload", TermKind::Basic, 35),
    ]
    .into_iter()
    .map(|(text, kind, importance)| VocabularyTerm::new(text, kind, importance))
    .collect()
}

#[test]
fn critical_terms_lift_raw_coverage_to_fifty() {
    let mut settings = settings();
    settings.terms.max_insertions = 2;

    let terms = vocabulary();
    let before = content_refinery::coverage::analyze(BODY, &terms);
    assert_eq!(before.raw_score, 30);
    // (90 + 85 + 40) / 525
    assert_eq!(before.weighted_score, 41);
    assert_eq!(before.critical_missing.len(), 2);

    let inputs = PipelineInputs {
        terms,
        ..Default::default()
    };
    let out = pipeline_with(settings)
        .process(
            record(BODY, Vec::new()),
            &inputs,
            &mut StdRng::seed_from_u64(11),
            &mut SequentialIds::default(),
        )
        .unwrap();

    assert_eq!(out.term_report.before_score, 30);
    assert_eq!(
        out.term_report.added_units(),
        vec!["protein synthesis", "strength training"]
    );
    assert_eq!(out.coverage.raw_score, 50);
    assert!(out.coverage.critical_missing.is_empty());
    assert_eq!(out.coverage.used_terms.len(), 5);
}

#[test]
fn relevant_guide_gets_a_descriptive_anchor() {
    let target = LinkTarget::new(
        "/protein-timing-guide",
        "The Complete Guide to Protein Timing for Athletes",
        "protein-timing-guide",
    );
    let inputs = PipelineInputs {
        keyword: Some("protein timing".to_string()),
        links: vec![target],
        ..Default::default()
    };
    let out = pipeline()
        .process(
            record(BODY, Vec::new()),
            &inputs,
            &mut StdRng::seed_from_u64(1),
            &mut SequentialIds::default(),
        )
        .unwrap();

    assert_eq!(out.link_report.added.len(), 1);
    assert!(out.link_report.added[0].score >= 0.55);
    assert_eq!(out.link_report.before_score, 0);
    assert_eq!(out.link_report.after_score, 1);
    assert!(out.record.html_body.contains(
        r#"<a href="/protein-timing-guide" title="complete guide to protein timing">Complete Guide to Protein Timing</a>"#
    ));
}

#[test]
fn sections_are_canonical_after_a_full_run() {
    let body = format!(
        "<h1>Protein Timing for Lifters</h1>\n{}\n\
         <section class=\"faq\"><h2>FAQ</h2><p>Old question?</p></section>\n\
         <h2>Conclusion</h2><p>Eat enough, spread it out, and train hard.</p>\n\
         <h2>References</h2><ul><li>An old citation</li></ul>\n\
         <div class=\"faq-section\"><p>Stale duplicate</p></div>",
        BODY
    );
    let faqs = vec![
        FaqItem {
            question: "How much protein per meal?".into(),
            answer: "Roughly 0.4 g per kg of body weight.".into(),
        },
        FaqItem {
            question: "Does timing matter for beginners?".into(),
            answer: "Total intake matters more.".into(),
        },
    ];
    let mut authority = Reference::new("https://www.nih.gov/protein", "Dietary Protein");
    authority.is_authority = true;
    let inputs = PipelineInputs {
        references: vec![authority, Reference::new("javascript:void(0)", "bad")],
        ..Default::default()
    };

    let raw = serde_json::to_string(&record(&body, faqs)).unwrap();
    let out = pipeline()
        .run(
            &raw,
            &inputs,
            &mut StdRng::seed_from_u64(5),
            &mut SequentialIds::default(),
        )
        .unwrap();
    let html = &out.record.html_body;

    assert_eq!(out.stage, Some("direct"));
    assert_eq!(out.faq_placement, Placement::Placeholder);
    assert!(!html.contains("<h1"));
    assert!(!html.contains("Old question") && !html.contains("Stale duplicate"));
    assert!(!html.contains("An old citation"));

    let faq_blocks = detect(html, SectionKind::Faq, 2, 0.7);
    assert_eq!(faq_blocks.len(), 1);
    assert!(faq_blocks[0].is_canonical_quality);
    assert!(html.find("wp-opt-faq-1").unwrap() < html.find("<h2>Conclusion").unwrap());

    assert!(html.ends_with("</section>"));
    assert!(html.contains("1 authoritative source cited"));
    assert!(html.contains("nih.gov &middot; 2026"));
    assert_eq!(detect(html, SectionKind::References, 1, 0.7).len(), 1);
    assert!(out.record.word_count > 100);
}

#[test]
fn content_about_sources_is_never_treated_as_references() {
    let body = format!(
        "{}\n<h2>Plant Sources of Iron</h2><p>Lentils and spinach carry plenty of iron for lifters.</p>",
        BODY
    );
    for references in [Vec::new(), vec![Reference::new("https://www.nih.gov/iron", "Iron")]] {
        let inputs = PipelineInputs {
            references,
            ..Default::default()
        };
        let out = pipeline()
            .process(
                record(&body, Vec::new()),
                &inputs,
                &mut StdRng::seed_from_u64(3),
                &mut SequentialIds::default(),
            )
            .unwrap();
        let html = &out.record.html_body;
        assert!(html.contains("<h2>Plant Sources of Iron</h2>"));
        assert!(html.contains("Lentils and spinach carry plenty of iron"));
    }
}

#[test]
fn many_stale_blocks_collapse_to_one_of_each() {
    let body = format!(
        "<section class=\"faq\"><p>old faq a</p></section>\n{}\n\
         <div class=\"faq-accordion\"><p>old faq b</p></div>\n\
         <h2>FAQ</h2><p>old faq c</p>\n\
         <section class=\"citations\"><p>ref one</p></section>\n\
         <div class=\"references\"><p>ref two</p></div>\n\
         <h2>Sources</h2><ul><li>ref three</li></ul>\n\
         <h2>Closing words</h2><p>Thanks for reading.</p>",
        BODY
    );
    let faqs = vec![
        FaqItem {
            question: "How much protein per meal?".into(),
            answer: "Roughly 0.4 g per kg of body weight.".into(),
        },
        FaqItem {
            question: "Does timing matter for beginners?".into(),
            answer: "Total intake matters more.".into(),
        },
    ];
    let inputs = PipelineInputs {
        references: vec![Reference::new("https://www.nih.gov/protein", "Dietary Protein")],
        ..Default::default()
    };
    let out = pipeline()
        .process(
            record(&body, faqs),
            &inputs,
            &mut StdRng::seed_from_u64(9),
            &mut SequentialIds::default(),
        )
        .unwrap();
    let html = &out.record.html_body;

    assert_eq!(out.faq_placement, Placement::Placeholder);
    assert_eq!(detect(html, SectionKind::Faq, 2, 0.7).len(), 1);
    assert_eq!(detect(html, SectionKind::References, 1, 0.7).len(), 1);
    for stale in ["old faq a", "old faq b", "old faq c", "ref one", "ref two", "ref three"] {
        assert!(!html.contains(stale), "{stale} survived");
    }
    assert!(html.contains("<h2>Why timing matters</h2>"));
    assert!(html.contains("Thanks for reading."));
    assert!(html.ends_with("</section>"));
}
