//! Groq client implementation

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::llm::core::{
    error::LlmError,
    provider::{EventStream, LlmProvider},
    types::GenerateRequest,
};

use super::mapper::{from_groq_chunk, to_groq_request, StreamState};
use super::sse::parse_sse_stream;
use super::types::GroqErrorEnvelope;

/// Groq model identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroqModel {
    /// Llama 3.3 70B, the support agent's default
    Llama33Versatile,
    /// Llama 3.1 8B, cheaper and faster
    Llama31Instant,
    /// Any other model id served by Groq
    Custom(String),
}

impl GroqModel {
    /// Get the model identifier string
    pub fn as_str(&self) -> &str {
        match self {
            GroqModel::Llama33Versatile => "llama-3.3-70b-versatile",
            GroqModel::Llama31Instant => "llama-3.1-8b-instant",
            GroqModel::Custom(id) => id,
        }
    }

    /// Resolve a configured model id to a known variant where possible
    pub fn from_id(id: &str) -> Self {
        match id {
            "llama-3.3-70b-versatile" => GroqModel::Llama33Versatile,
            "llama-3.1-8b-instant" => GroqModel::Llama31Instant,
            other => GroqModel::Custom(other.to_string()),
        }
    }
}

/// Client for Groq's OpenAI-compatible chat completions API
pub struct GroqClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Bearer credential
    api_key: String,
    /// API root, e.g. `https://api.groq.com/openai/v1`
    base_url: String,
    /// Model to use
    model: GroqModel,
}

impl GroqClient {
    /// Create a new Groq client
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is blank or the HTTP client cannot be built.
    pub fn new(api_key: String, base_url: String, model: GroqModel) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::AuthenticationError(
                "GROQ_API_KEY is empty".to_string(),
            ));
        }

        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| LlmError::HttpError {
                status: 0,
                body: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            api_key,
            base_url,
            model,
        })
    }

    pub fn model(&self) -> &GroqModel {
        &self.model
    }

    /// Build the endpoint URL for chat completions
    fn build_endpoint_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Make a streaming request to Groq
    async fn make_streaming_request(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
        let groq_request = to_groq_request(request, self.model.as_str());
        debug!(
            model = %self.model.as_str(),
            messages = groq_request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(self.build_endpoint_url())
            .bearer_auth(&self.api_key)
            .json(&groq_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status(status, retry_after, body));
        }

        let sse_stream = parse_sse_stream(Box::pin(response.bytes_stream()));

        let mut state = StreamState::default();
        let event_stream = sse_stream.flat_map(move |result| match result {
            Ok(chunk) => futures::stream::iter(
                from_groq_chunk(chunk, &mut state)
                    .into_iter()
                    .map(Ok)
                    .collect::<Vec<_>>(),
            ),
            Err(e) => futures::stream::iter(vec![Err(e)]),
        });

        Ok(Box::pin(event_stream))
    }
}

#[async_trait]
impl LlmProvider for GroqClient {
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError> {
        self.make_streaming_request(request).await
    }
}

/// `Retry-After` in whole seconds, when present
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Map a non-2xx response to the matching `LlmError`
fn error_from_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimitExceeded { retry_after };
    }

    let envelope = serde_json::from_str::<GroqErrorEnvelope>(&body).ok();

    if status == StatusCode::UNAUTHORIZED {
        let message = envelope.map(|e| e.error.message).unwrap_or(body);
        return LlmError::AuthenticationError(message);
    }

    match envelope {
        Some(envelope) => LlmError::ProviderError {
            code: envelope
                .error
                .code
                .or(envelope.error.error_type)
                .unwrap_or_else(|| status.as_u16().to_string()),
            message: envelope.error.message,
        },
        None => LlmError::HttpError {
            status: status.as_u16(),
            body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_groq_model_as_str() {
        assert_eq!(GroqModel::Llama33Versatile.as_str(), "llama-3.3-70b-versatile");
        assert_eq!(GroqModel::Llama31Instant.as_str(), "llama-3.1-8b-instant");
        assert_eq!(GroqModel::Custom("qwen/qwen3-32b".to_string()).as_str(), "qwen/qwen3-32b");
    }

    #[test]
    fn test_groq_model_from_id() {
        assert_eq!(GroqModel::from_id("llama-3.3-70b-versatile"), GroqModel::Llama33Versatile);
        assert_eq!(
            GroqModel::from_id("mixtral-8x7b-32768"),
            GroqModel::Custom("mixtral-8x7b-32768".to_string())
        );
    }

    #[test]
    fn test_new_rejects_blank_api_key() {
        let result = GroqClient::new(
            "  ".to_string(),
            "https://api.groq.com/openai/v1".to_string(),
            GroqModel::Llama33Versatile,
        );
        assert!(matches!(result, Err(LlmError::AuthenticationError(_))));
    }

    #[test]
    fn test_endpoint_url_trims_trailing_slash() {
        let client = GroqClient::new(
            "gsk_test".to_string(),
            "https://api.groq.com/openai/v1/".to_string(),
            GroqModel::Llama33Versatile,
        )
        .unwrap();
        assert_eq!(
            client.build_endpoint_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_error_from_status_rate_limited() {
        let err = error_from_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(3)),
            String::new(),
        );
        assert!(matches!(
            err,
            LlmError::RateLimitExceeded { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_error_from_status_unauthorized() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let err = error_from_status(StatusCode::UNAUTHORIZED, None, body.to_string());
        assert!(matches!(err, LlmError::AuthenticationError(m) if m == "Invalid API Key"));
    }

    #[test]
    fn test_error_from_status_provider_and_plain() {
        let body = r#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#;
        let err = error_from_status(StatusCode::NOT_FOUND, None, body.to_string());
        assert!(matches!(
            err,
            LlmError::ProviderError { ref code, .. } if code == "invalid_request_error"
        ));

        let err = error_from_status(StatusCode::BAD_GATEWAY, None, "upstream down".to_string());
        assert!(matches!(err, LlmError::HttpError { status: 502, .. }));
    }
}
