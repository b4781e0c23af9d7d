use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Tunables for every pipeline stage. Missing keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub parser: ParserSettings,
    pub content: ContentSettings,
    pub terms: TermSettings,
    pub links: LinkSettings,
    pub sections: SectionSettings,
    pub provider: ProviderSettings,
}

impl Settings {
    /// Defaults, then an optional TOML/JSON/YAML file, then `CONTENT_*` env vars
    /// (`CONTENT_LINKS__MAX_LINKS=20`).
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("CONTENT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    pub min_response_chars: usize,
    pub min_salvage_body_chars: usize,
    pub preview_chars: usize,
    pub trim_threshold: f64,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            min_response_chars: 100,
            min_salvage_body_chars: 1000,
            preview_chars: 200,
            trim_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    pub min_body_chars: usize,
    pub strip_h1: bool,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            min_body_chars: 2000,
            strip_h1: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermSettings {
    pub target_coverage: u32,
    pub max_insertions: usize,
    pub per_element_cap: usize,
    pub min_text_chars: usize,
    pub max_text_chars: usize,
    pub min_context_score: f64,
}

impl Default for TermSettings {
    fn default() -> Self {
        Self {
            target_coverage: 85,
            max_insertions: 30,
            per_element_cap: 2,
            min_text_chars: 80,
            max_text_chars: 600,
            min_context_score: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub min_links: usize,
    pub max_links: usize,
    pub min_relevance: f64,
    pub min_distance_chars: usize,
    pub max_per_section: usize,
    pub min_text_chars: usize,
    pub max_text_chars: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            min_links: 8,
            max_links: 15,
            min_relevance: 0.55,
            min_distance_chars: 450,
            max_per_section: 2,
            min_text_chars: 40,
            max_text_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionSettings {
    /// Fraction of the supplied items an existing block must carry to be kept.
    pub canonical_ratio: f64,
}

impl Default for SectionSettings {
    fn default() -> Self {
        Self {
            canonical_ratio: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub attempts: u32,
    pub base_backoff_ms: u64,
    pub max_jitter_ms: u64,
    pub min_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub words_per_minute: u64,
    pub target_words: u64,
    pub min_response_chars: usize,
    pub model: String,
    pub temperature: f32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_backoff_ms: 3000,
            max_jitter_ms: 1000,
            min_timeout_secs: 180,
            max_timeout_secs: 600,
            words_per_minute: 1500,
            target_words: 4500,
            min_response_chars: 500,
            model: "google/gemini-2.5-flash-preview".to_string(),
            temperature: 0.85,
        }
    }
}

// ── Tests ──
