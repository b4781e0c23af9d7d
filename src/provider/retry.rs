use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::{Provider, ProviderRequest};
use crate::error::ProviderError;
use crate::settings::ProviderSettings;

/// Attempt budget, timeouts and backoff for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_timeout: Duration,
    pub base_backoff: Duration,
    pub max_jitter: Duration,
    pub min_response_chars: usize,
}

impl RetryPolicy {
    /// Timeout scales with the requested length: 1.5× the time the provider
    /// needs at `words_per_minute`, clamped to the configured range.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let wpm = settings.words_per_minute.max(1) as f64;
        let secs = settings.target_words as f64 / wpm * 60.0 * 1.5;
        let min = settings.min_timeout_secs as f64;
        let max = (settings.max_timeout_secs as f64).max(min);
        Self {
            attempts: settings.attempts.max(1),
            base_timeout: Duration::from_secs_f64(secs.clamp(min, max)),
            base_backoff: Duration::from_millis(settings.base_backoff_ms),
            max_jitter: Duration::from_millis(settings.max_jitter_ms),
            min_response_chars: settings.min_response_chars,
        }
    }

    /// Later attempts get half the base timeout more each.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout.mul_f64(1.0 + 0.5 * attempt as f64)
    }

    pub fn backoff_for<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 { 0 } else { rng.gen_range(0..=jitter_ms) };
        self.base_backoff * 2u32.saturating_pow(attempt) + Duration::from_millis(jitter)
    }

    /// A usable response is long enough and mentions the required fields.
    pub fn validate(&self, text: &str) -> Result<(), ProviderError> {
        let len = text.chars().count();
        if len < self.min_response_chars {
            return Err(ProviderError::Malformed(format!(
                "response too short: {} characters",
                len
            )));
        }
        if !text.contains("\"htmlContent\"") || !text.contains("\"title\"") {
            return Err(ProviderError::Malformed(
                "response is missing htmlContent or title".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sends `request`, racing each attempt against its timeout and backing off
/// between attempts. Non-retryable errors return immediately.
pub async fn send_with_retry<P: Provider + ?Sized>(
    provider: &P,
    request: &ProviderRequest<'_>,
    policy: &RetryPolicy,
) -> Result<String, ProviderError> {
    let mut attempt = 0;
    loop {
        let timeout = policy.timeout_for(attempt);
        debug!(
            provider = provider.name(),
            attempt = attempt + 1,
            timeout_secs = timeout.as_secs_f64(),
            "sending generation request"
        );

        let outcome = match tokio::time::timeout(timeout, provider.send(request)).await {
            Ok(Ok(text)) => policy.validate(&text).map(|_| text),
            Ok(Err(e)) => Err(e.with_timeout(timeout)),
            Err(_) => Err(ProviderError::Timeout { after: timeout }),
        };

        let err = match outcome {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        attempt += 1;
        if !err.is_retryable() || attempt >= policy.attempts {
            return Err(err);
        }

        let backoff = policy.backoff_for(attempt - 1, &mut rand::thread_rng());
        warn!(
            "{} failed (attempt {}/{}): {}, backing off {:.1}s",
            provider.name(),
            attempt,
            policy.attempts,
            err,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
}

// ── Tests ──
