use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Provider, ProviderRequest};
use crate::error::ProviderError;

const ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenAI-compatible chat completions through OpenRouter.
pub struct OpenRouterProvider {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl OpenRouterProvider {
    /// Request timeouts are enforced by the retry loop, not the client.
    pub fn new(api_key: String, model: String) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self {
            api_key,
            model,
            endpoint: ENDPOINT.to_string(),
            client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| ProviderError::Rejected {
                status: 401,
                body: "invalid OpenRouter API key".to_string(),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn send(&self, request: &ProviderRequest<'_>) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: request.user_prompt,
                },
            ],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify(status, text));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        extract_answer(parsed)
    }
}

/// 429 and 5xx are worth retrying; any other failure status is final.
fn classify(status: StatusCode, body: String) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited
    } else if status.is_server_error() {
        ProviderError::Unavailable(format!("{}: {}", status, body))
    } else {
        ProviderError::Rejected {
            status: status.as_u16(),
            body,
        }
    }
}

fn extract_answer(parsed: ChatResponse) -> Result<String, ProviderError> {
    parsed
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content.filter(|c| !c.trim().is_empty()))
        .ok_or_else(|| ProviderError::Malformed("response has no choices".to_string()))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderError::RateLimited
        ));
        let unavailable = classify(StatusCode::BAD_GATEWAY, "upstream".into());
        assert!(unavailable.is_retryable());
        let rejected = classify(StatusCode::UNAUTHORIZED, "no key".into());
        assert!(matches!(rejected, ProviderError::Rejected { status: 401, ref body } if body == "no key"));
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn empty_choices_are_malformed() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_answer(parsed), Err(ProviderError::Malformed(_))));

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}},{"message":{"content":"{}"}}]}"#)
                .unwrap();
        assert_eq!(extract_answer(parsed).unwrap(), "{}");
    }
}
