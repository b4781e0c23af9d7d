use std::time::Duration;

use thiserror::Error;

/// Fatal outcomes of processing one document.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("JSON parse failed after all healing attempts. Preview: {preview}")]
    ParseFailure { preview: String },

    #[error("content too short: {len} characters (minimum {min})")]
    ContentTooShort { len: usize, min: usize },

    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Failures at the model-provider boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("generation timeout after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Rejected { .. })
    }

    /// Stamps a timeout raised by the HTTP client with the attempt's budget.
    pub fn with_timeout(self, after: Duration) -> Self {
        match self {
            ProviderError::Timeout { .. } => ProviderError::Timeout { after },
            other => other,
        }
    }
}

/// Client timeouts carry no duration here; `send_with_retry` fills it in.
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                after: Duration::ZERO,
            }
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}
