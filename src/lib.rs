//! Post-processing for model-generated articles: recover the JSON record,
//! measure and raise vocabulary coverage, place internal links, repair CTA
//! buttons, and keep a single canonical FAQ, key-takeaways and references
//! block in the body.

pub mod clock;
pub mod coverage;
pub mod cta;
pub mod error;
pub mod html;
pub mod inject;
pub mod parser;
pub mod pipeline;
pub mod provider;
pub mod record;
pub mod sections;
pub mod settings;

pub use error::{PipelineError, ProviderError};
pub use pipeline::{Pipeline, PipelineInputs, PipelineOutput};
pub use record::{ContentRecord, FaqItem, LinkTarget, Reference, TermKind, VocabularyTerm};
pub use settings::Settings;
