use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Words that never carry an anchor on their own.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is", "are",
    "this", "that", "these", "those", "be", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "must", "shall", "by", "from",
    "up", "about", "into", "through", "during", "before", "after", "above", "below", "as", "per",
    "between", "among", "out", "off", "over", "under", "again", "further", "then", "once", "here",
    "there", "when", "where", "why", "how", "all", "both", "each", "few", "more", "most", "other",
    "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "just",
    "click", "read", "view", "see", "your", "you", "our", "its", "was", "were",
];

const MIN_ANCHOR_WORDS: usize = 3;
const MAX_ANCHOR_WORDS: usize = 6;
const MIN_MEANINGFUL_WORDS: usize = 3;
const MAX_MEANINGFUL_WORDS: usize = 5;

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

pub fn is_meaningful(word: &str) -> bool {
    word.chars().count() > 2 && !is_stop_word(word)
}

/// Lowercase words of a title with tags and punctuation removed.
pub fn title_words(title: &str) -> Vec<String> {
    let plain = TAG_RE.replace_all(title, " ");
    plain
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

pub fn meaningful_words(title: &str) -> Vec<String> {
    title_words(title).into_iter().filter(|w| is_meaningful(w)).collect()
}

/// Anchor phrase for a link target title: the first contiguous run of title
/// words, starting at a meaningful word, that holds the most meaningful words
/// (3 to 5) while staying within six words. Interior stop words are kept.
pub fn synthesize(title: &str) -> Option<String> {
    let words = title_words(title);
    let meaningful = words.iter().filter(|w| is_meaningful(w)).count();
    let wanted = match meaningful {
        0..=2 => return None,
        3 => 3,
        4 | 5 => 4,
        _ => MAX_MEANINGFUL_WORDS,
    };

    let mut best: Option<(usize, Vec<&str>)> = None;
    for start in (0..words.len()).filter(|&i| is_meaningful(&words[i])) {
        let window = window_from(&words[start..], wanted);
        let count = meaningful_count(&window);
        if best.as_ref().map_or(true, |(n, _)| count > *n) {
            best = Some((count, window));
        }
        if count == wanted {
            break;
        }
    }

    let (count, picked) = best?;
    (count >= MIN_MEANINGFUL_WORDS).then(|| picked.join(" "))
}

fn window_from(words: &[String], wanted: usize) -> Vec<&str> {
    let mut picked: Vec<&str> = Vec::new();
    let mut seen = 0;
    for word in words {
        if seen == wanted || picked.len() == MAX_ANCHOR_WORDS {
            break;
        }
        if is_meaningful(word) {
            seen += 1;
        }
        picked.push(word);
    }
    while picked.last().is_some_and(|w| !is_meaningful(w)) {
        picked.pop();
    }
    picked
}

fn meaningful_count(words: &[&str]) -> usize {
    words.iter().filter(|w| is_meaningful(w)).count()
}

/// A phrase is a usable anchor when it is 3–6 words and not all stop words.
pub fn is_acceptable(phrase: &str) -> bool {
    let words: Vec<String> = phrase.split_whitespace().map(str::to_lowercase).collect();
    (MIN_ANCHOR_WORDS..=MAX_ANCHOR_WORDS).contains(&words.len())
        && !words.iter().all(|w| is_stop_word(w))
}

/// Case-insensitive, whitespace-tolerant matcher for an anchor phrase.
pub fn pattern(phrase: &str) -> Option<Regex> {
    let body = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    if body.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)\b{}\b", body)).ok()
}

// ── Tests ──
