//! The only asynchronous boundary: fetching raw model output.

mod openrouter;
mod retry;

use async_trait::async_trait;

use crate::error::ProviderError;

pub use openrouter::OpenRouterProvider;
pub use retry::{send_with_retry, RetryPolicy};

/// Implemented by concrete model providers.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, request: &ProviderRequest<'_>) -> Result<String, ProviderError>;
}

/// Request envelope shared by the providers.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub temperature: f32,
}
