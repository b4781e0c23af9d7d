use crate::record::LinkTarget;

use super::anchor::meaningful_words;

const SEMANTIC_WEIGHT: f64 = 0.4;
const TOPIC_WEIGHT: f64 = 0.3;
const QUALITY_WEIGHT: f64 = 0.3;

const TOPIC_MATCH: f64 = 0.85;
const TOPIC_MISS: f64 = 0.3;

const IDEAL_TITLE_WORDS: f64 = 6.0;
const GOOD_SLUG: f64 = 0.9;
const GENERIC_SLUG: f64 = 0.4;

/// Title word → words in the context that count as the same topic.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("guide", &["tutorial", "how-to", "resource", "handbook", "manual"]),
    ("seo", &["search", "optimization", "ranking", "serp"]),
    ("content", &["article", "post", "page", "writing", "copy"]),
    ("wordpress", &["wp", "blog", "site", "website"]),
    ("marketing", &["promotion", "campaign", "strategy", "advertising"]),
    ("development", &["code", "programming", "engineer"]),
    ("performance", &["speed", "optimization", "fast", "efficient"]),
    ("security", &["protection", "safety", "secure", "encryption"]),
    ("nutrition", &["diet", "food", "eating", "meal"]),
    ("training", &["workout", "exercise", "fitness"]),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceBreakdown {
    pub semantic: f64,
    pub topic: f64,
    pub quality: f64,
    pub total: f64,
}

/// Composite 0–1 fit of `target` for content about `context`.
pub fn score(target: &LinkTarget, context: &str) -> RelevanceBreakdown {
    let title = meaningful_words(&target.title);
    let context_words = meaningful_words(context);
    let context_lower = context.to_lowercase();

    let shared = title.iter().filter(|w| context_words.contains(w)).count();
    let semantic = (shared as f64 / title.len().max(1) as f64).min(1.0);

    let topic = if shared > 0 || title.iter().any(|w| is_synonym(w, &context_lower)) {
        TOPIC_MATCH
    } else {
        TOPIC_MISS
    };

    let length = (title.len() as f64 / IDEAL_TITLE_WORDS).min(1.0);
    let quality = (length + slug_quality(&target.slug)) / 2.0;

    let mut total = SEMANTIC_WEIGHT * semantic + TOPIC_WEIGHT * topic + QUALITY_WEIGHT * quality;
    if let Some(hint) = target.relevance_hint {
        total = (total + hint.clamp(0.0, 1.0)) / 2.0;
    }

    RelevanceBreakdown {
        semantic,
        topic,
        quality,
        total: total.clamp(0.0, 1.0),
    }
}

fn slug_quality(slug: &str) -> f64 {
    let slug = slug.to_lowercase();
    if slug.contains("uncategorized") || slug.contains("misc") || slug.chars().count() <= 3 {
        GENERIC_SLUG
    } else {
        GOOD_SLUG
    }
}

fn is_synonym(word: &str, context: &str) -> bool {
    SYNONYMS.iter().any(|(key, synonyms)| {
        word.contains(key) && (context.contains(key) || synonyms.iter().any(|s| context.contains(s)))
    })
}

// ── Tests ──
