//! Canonical markup for the FAQ, references and key-takeaways blocks. Each
//! carries its own `<style>` so the block can be moved around the document as
//! one unit.

use crate::clock::{Clock, IdSource};
use crate::html::{escape_attr, escape_text};
use crate::record::{FaqItem, Reference};

const FAQ_CSS: &str = "
.{id} { margin: 48px 0; padding: 32px; border-radius: 16px; background: linear-gradient(135deg, #f8fafc 0%, #eef2ff 100%); box-shadow: 0 10px 30px rgba(15, 23, 42, 0.08); }
.{id} .faq-header { text-align: center; margin-bottom: 24px; }
.{id} .faq-header h2 { margin: 0 0 8px; font-size: 28px; }
.{id} .faq-header p { margin: 0; color: #64748b; }
.{id} .faq-item { margin-bottom: 12px; border-radius: 12px; background: #fff; border: 1px solid #e2e8f0; overflow: hidden; }
.{id} .faq-checkbox { display: none; }
.{id} .faq-question { display: flex; align-items: center; gap: 12px; padding: 18px 20px; cursor: pointer; font-weight: 600; }
.{id} .faq-number { flex: 0 0 28px; height: 28px; line-height: 28px; text-align: center; border-radius: 50%; color: #fff; background: linear-gradient(135deg, #6366f1, #8b5cf6); font-size: 14px; }
.{id} .faq-chevron { margin-left: auto; transition: transform 0.2s ease; }
.{id} .faq-answer { max-height: 0; overflow: hidden; transition: max-height 0.3s ease; padding: 0 20px; }
.{id} .faq-checkbox:checked + .faq-question .faq-chevron { transform: rotate(180deg); }
.{id} .faq-checkbox:checked + .faq-question + .faq-answer { max-height: 1200px; padding: 0 20px 18px; }
";

const REFERENCES_CSS: &str = "
.{id} { margin: 48px 0; border-radius: 16px; border: 1px solid #e2e8f0; background: linear-gradient(180deg, #ffffff 0%, #f8fafc 100%); overflow: hidden; }
.{id} .ref-toggle { display: none; }
.{id} .ref-header { display: flex; align-items: center; gap: 12px; padding: 20px 24px; cursor: pointer; }
.{id} .ref-title { font-weight: 700; font-size: 18px; }
.{id} .ref-count { color: #64748b; font-size: 14px; }
.{id} .ref-chevron { margin-left: auto; transition: transform 0.2s ease; }
.{id} .ref-content { display: none; padding: 0 24px 24px; gap: 12px; }
.{id} .ref-toggle:checked + .ref-header .ref-chevron { transform: rotate(180deg); }
.{id} .ref-toggle:checked + .ref-header + .ref-content { display: grid; }
.{id} .ref-card { display: flex; align-items: center; gap: 12px; padding: 14px 16px; border-radius: 10px; border: 1px solid #e2e8f0; background: #fff; color: inherit; text-decoration: none; }
.{id} .ref-card:hover { border-color: #6366f1; }
.{id} .ref-card-body { display: flex; flex-direction: column; gap: 2px; }
.{id} .ref-card-meta { color: #64748b; font-size: 13px; }
.{id} .ref-badge { margin-left: auto; padding: 2px 8px; border-radius: 999px; background: #dcfce7; color: #166534; font-size: 12px; font-weight: 600; }
";

const TAKEAWAYS_CSS: &str = "
.{id} { margin: 48px 0; padding: 32px; border-radius: 12px; border: 1px solid rgba(34, 197, 94, 0.2); background: linear-gradient(135deg, #f0fdf4 0%, #dcfce7 100%); box-shadow: 0 4px 20px rgba(0, 0, 0, 0.05); }
.{id} .takeaways-header { display: flex; align-items: center; gap: 14px; margin-bottom: 24px; padding-bottom: 20px; border-bottom: 1px solid rgba(34, 197, 94, 0.15); }
.{id} .takeaways-header h2 { margin: 0; font-size: 20px; color: #166534; }
.{id} .takeaways-icon { flex: 0 0 44px; height: 44px; line-height: 44px; text-align: center; border-radius: 12px; background: linear-gradient(135deg, #22c55e 0%, #16a34a 100%); font-size: 22px; }
.{id} .takeaways-list { list-style: none; margin: 0; padding: 0; }
.{id} .takeaway-item { display: flex; align-items: flex-start; gap: 14px; margin-bottom: 12px; padding: 16px 18px; border-radius: 10px; border: 1px solid rgba(34, 197, 94, 0.15); background: rgba(255, 255, 255, 0.8); color: #14532d; line-height: 1.65; }
.{id} .takeaway-check { flex: 0 0 24px; height: 24px; line-height: 24px; text-align: center; border-radius: 6px; background: linear-gradient(135deg, #22c55e 0%, #16a34a 100%); color: #fff; font-weight: 700; }
";

fn style(css: &str, id: &str) -> String {
    format!("<style>{}</style>", css.replace("{id}", id))
}

/// FAQ accordion with schema.org FAQPage microdata.
pub fn render_faq(faqs: &[FaqItem], ids: &mut dyn IdSource) -> String {
    let id = ids.next_id("wp-opt-faq");
    let mut out = format!(
        "<section class=\"wp-opt-faq {id}\" id=\"{id}\" itemscope itemtype=\"https://schema.org/FAQPage\">\n{}\n",
        style(FAQ_CSS, &id),
    );
    out.push_str(&format!(
        "<div class=\"faq-header\"><h2>Frequently Asked Questions</h2><p>{} questions answered</p></div>\n",
        faqs.len()
    ));

    for (i, faq) in faqs.iter().enumerate() {
        let item = format!("{id}-q{}", i + 1);
        out.push_str(&format!(
            concat!(
                "<div class=\"faq-item\" itemscope itemprop=\"mainEntity\" itemtype=\"https://schema.org/Question\">",
                "<input type=\"checkbox\" id=\"{item}\" class=\"faq-checkbox\" aria-hidden=\"true\">",
                "<label for=\"{item}\" class=\"faq-question\">",
                "<span class=\"faq-number\">{n}</span><span itemprop=\"name\">{q}</span><span class=\"faq-chevron\">&#9662;</span>",
                "</label>",
                "<div class=\"faq-answer\" itemscope itemprop=\"acceptedAnswer\" itemtype=\"https://schema.org/Answer\">",
                "<div itemprop=\"text\"><p>{a}</p></div>",
                "</div></div>\n",
            ),
            item = item,
            n = i + 1,
            q = escape_text(faq.question.trim()),
            a = escape_text(faq.answer.trim()),
        ));
    }
    out.push_str("</section>");
    out
}

/// Collapsible list of source cards. Callers pass only renderable references.
pub fn render_references(refs: &[Reference], clock: &dyn Clock, ids: &mut dyn IdSource) -> String {
    let id = ids.next_id("ref-accordion");
    let year = clock.content_year().to_string();
    let noun = if refs.len() == 1 { "source" } else { "sources" };

    let mut out = format!(
        "<section class=\"ref-accordion {id}\" id=\"{id}\">\n{}\n",
        style(REFERENCES_CSS, &id),
    );
    out.push_str(&format!(
        concat!(
            "<input type=\"checkbox\" id=\"{id}-toggle\" class=\"ref-toggle\">",
            "<label for=\"{id}-toggle\" class=\"ref-header\">",
            "<span class=\"ref-title\">Sources &amp; References</span>",
            "<span class=\"ref-count\">{n} authoritative {noun} cited</span>",
            "<span class=\"ref-chevron\">&#9662;</span>",
            "</label>\n<div class=\"ref-content\">\n",
        ),
        id = id,
        n = refs.len(),
        noun = noun,
    ));

    for r in refs {
        let domain = r.display_domain();
        let source = r.source.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(&domain);
        let title = if r.title.trim().is_empty() { "Untitled Source" } else { r.title.trim() };
        let badge = if r.is_authority {
            "<span class=\"ref-badge\">Authority</span>"
        } else {
            ""
        };
        out.push_str(&format!(
            concat!(
                "<a class=\"ref-card\" href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">",
                "<img src=\"https://www.google.com/s2/favicons?domain={domain}&amp;sz=32\" alt=\"\" width=\"20\" height=\"20\" loading=\"lazy\">",
                "<span class=\"ref-card-body\"><span class=\"ref-card-title\">{title}</span>",
                "<span class=\"ref-card-meta\">{source} &middot; {year}</span></span>{badge}</a>\n",
            ),
            url = escape_attr(&r.url),
            domain = escape_attr(&domain),
            title = escape_text(title),
            source = escape_text(source),
            year = escape_text(r.year.as_deref().unwrap_or(&year)),
            badge = badge,
        ));
    }
    out.push_str("</div>\n</section>");
    out
}

/// Checklist box summarising the article, meant to sit right before the FAQ.
pub fn render_takeaways(items: &[String], ids: &mut dyn IdSource) -> String {
    let id = ids.next_id("wp-opt-takeaways");
    let mut out = format!(
        "<aside class=\"wp-opt-takeaways {id}\" id=\"{id}\">\n{}\n",
        style(TAKEAWAYS_CSS, &id),
    );
    out.push_str(concat!(
        "<div class=\"takeaways-header\"><span class=\"takeaways-icon\" aria-hidden=\"true\">&#127919;</span>",
        "<h2>Key Takeaways</h2></div>\n<ul class=\"takeaways-list\">\n",
    ));
    for item in items {
        out.push_str(&format!(
            "<li class=\"takeaway-item\"><span class=\"takeaway-check\" aria-hidden=\"true\">&#10003;</span><span>{}</span></li>\n",
            escape_text(item.trim())
        ));
    }
    out.push_str("</ul>\n</aside>");
    out
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SequentialIds};
    use crate::html::Document;
    use chrono::NaiveDate;

    fn faqs() -> Vec<FaqItem> {
        vec![
            FaqItem {
                question: "When should I eat protein?".into(),
                answer: "Within two hours of training.".into(),
            },
            FaqItem {
                question: "Is <whey> better than casein?".into(),
                answer: "Whey digests faster & casein slower.".into(),
            },
        ]
    }

    #[test]
    fn faq_block_is_self_contained() {
        let html = render_faq(&faqs(), &mut SequentialIds::default());
        assert!(html.starts_with(r#"<section class="wp-opt-faq wp-opt-faq-1" id="wp-opt-faq-1""#));
        assert!(html.contains(".wp-opt-faq-1 .faq-item"));
        assert!(html.contains("linear-gradient") && html.contains("border-radius"));
        assert_eq!(html.matches(r#"class="faq-question""#).count(), 2);
        assert!(html.contains("2 questions answered"));
        assert!(html.contains("Is &lt;whey&gt; better than casein?"));
        assert!(html.contains("faster &amp; casein"));

        let doc = Document::parse(&html);
        assert_eq!(doc.children(crate::html::ROOT).len(), 1);
    }

    #[test]
    fn takeaways_box_escapes_items() {
        let items = vec!["Eat 20-40 g per meal".to_string(), " Timing < total intake ".to_string()];
        let html = render_takeaways(&items, &mut SequentialIds::default());
        assert!(html.starts_with(r#"<aside class="wp-opt-takeaways wp-opt-takeaways-1""#));
        assert_eq!(html.matches(r#"class="takeaway-item""#).count(), 2);
        assert!(html.contains("<span>Timing &lt; total intake</span>"));
        assert!(html.ends_with("</aside>"));
    }

    #[test]
    fn reference_cards_fall_back_to_content_year_and_domain() {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2025, 12, 10).unwrap());
        let mut authority = Reference::new("https://www.nih.gov/protein?a=1&b=2", "Protein \"Needs\"");
        authority.is_authority = true;
        let mut dated = Reference::new("https://example.org/x", "");
        dated.year = Some("2021".into());
        dated.source = Some("Example Journal".into());

        let html = render_references(&[authority, dated], &clock, &mut SequentialIds::default());
        assert!(html.contains("2 authoritative sources cited"));
        assert_eq!(html.matches(r#"class="ref-card""#).count(), 2);
        assert!(html.contains(r#"href="https://www.nih.gov/protein?a=1&amp;b=2""#));
        assert!(html.contains("nih.gov &middot; 2026"));
        assert!(html.contains("Example Journal &middot; 2021"));
        assert!(html.contains("Untitled Source"));
        assert_eq!(html.matches("ref-badge\">Authority").count(), 1);
    }
}
