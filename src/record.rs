use serde::{Deserialize, Serialize};

/// A generated article as it travels through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub slug: String,
    #[serde(rename = "htmlContent", alias = "body", default)]
    pub html_body: String,
    #[serde(default)]
    pub faqs: Vec<FaqItem>,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    #[serde(default)]
    pub schema: serde_json::Value,
    #[serde(default)]
    pub word_count: usize,
    /// False when the record was rebuilt from a truncated or salvaged payload.
    #[serde(default = "verified_by_default")]
    pub structure_verified: bool,
}

fn verified_by_default() -> bool {
    true
}

fn valid_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermKind {
    Header,
    Basic,
    Extended,
    Title,
}

impl TermKind {
    /// Header and title terms belong in headings, the rest in body copy.
    pub fn is_heading(self) -> bool {
        matches!(self, TermKind::Header | TermKind::Title)
    }
}

/// Controlled-vocabulary entry the body text should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyTerm {
    #[serde(alias = "term")]
    pub text: String,
    #[serde(alias = "type")]
    pub kind: TermKind,
    #[serde(default, alias = "recommended")]
    pub recommended_count: u32,
    #[serde(default)]
    pub importance: Option<u8>,
}

pub const DEFAULT_IMPORTANCE: u8 = 50;
pub const CRITICAL_IMPORTANCE: u8 = 80;

impl VocabularyTerm {
    pub fn new(text: impl Into<String>, kind: TermKind, importance: u8) -> Self {
        Self {
            text: text.into(),
            kind,
            recommended_count: 1,
            importance: Some(importance),
        }
    }

    pub fn weight(&self) -> u32 {
        u32::from(self.importance.unwrap_or(DEFAULT_IMPORTANCE))
    }

    pub fn is_critical(&self) -> bool {
        self.importance.unwrap_or(DEFAULT_IMPORTANCE) >= CRITICAL_IMPORTANCE
    }
}

/// An internal page the link injector may point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTarget {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, alias = "relevanceScore")]
    pub relevance_hint: Option<f64>,
}

impl LinkTarget {
    pub fn new(url: impl Into<String>, title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            slug: slug.into(),
            relevance_hint: None,
        }
    }
}

/// An external source cited at the end of the article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default = "valid_by_default")]
    pub is_valid: bool,
    #[serde(default)]
    pub is_authority: bool,
}

impl Reference {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            source: None,
            domain: None,
            year: None,
            is_valid: true,
            is_authority: false,
        }
    }

    /// Only absolute http(s) links that were not flagged invalid get rendered.
    pub fn is_renderable(&self) -> bool {
        self.is_valid && (self.url.starts_with("http://") || self.url.starts_with("https://"))
    }

    pub fn display_domain(&self) -> String {
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            return domain.to_string();
        }
        self.url
            .split("//")
            .nth(1)
            .unwrap_or(&self.url)
            .split('/')
            .next()
            .unwrap_or("")
            .trim_start_matches("www.")
            .to_string()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_wire_names() {
        let raw = r#"{"title":"T","metaDescription":"m","htmlContent":"<p>x</p>","wordCount":3}"#;
        let record: ContentRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.meta_description, "m");
        assert_eq!(record.html_body, "<p>x</p>");
        assert_eq!(record.word_count, 3);
        assert!(record.structure_verified);
        assert!(record.faqs.is_empty());
        assert!(record.key_takeaways.is_empty());

        let raw = r#"{"htmlContent":"<p>x</p>","keyTakeaways":["one","two"]}"#;
        let record: ContentRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.key_takeaways, vec!["one", "two"]);
    }

    #[test]
    fn term_accepts_original_field_names() {
        let raw = r#"{"term":"protein intake","type":"basic","recommended":3,"importance":90}"#;
        let term: VocabularyTerm = serde_json::from_str(raw).unwrap();
        assert_eq!(term.text, "protein intake");
        assert_eq!(term.kind, TermKind::Basic);
        assert!(term.is_critical());
    }

    #[test]
    fn unspecified_importance_is_mid_range() {
        let raw = r#"{"text":"hydration","kind":"extended"}"#;
        let term: VocabularyTerm = serde_json::from_str(raw).unwrap();
        assert_eq!(term.weight(), 50);
        assert!(!term.is_critical());
    }

    #[test]
    fn reference_domain_falls_back_to_host() {
        let r = Reference::new("https://www.nih.gov/health/protein", "Protein");
        assert_eq!(r.display_domain(), "nih.gov");
        assert!(r.is_renderable());
        assert!(!Reference::new("ftp://x.org", "x").is_renderable());
    }

    #[test]
    fn reference_validity_defaults_on_and_can_be_flagged() {
        let r: Reference = serde_json::from_str(r#"{"url":"https://nih.gov/a"}"#).unwrap();
        assert!(r.is_valid && r.is_renderable());
        let r: Reference = serde_json::from_str(r#"{"url":"https://nih.gov/a","isValid":false}"#).unwrap();
        assert!(!r.is_renderable());
    }
}
