//! Completion engine boundary
//!
//! The support service only needs "messages in, reply out". `CompletionEngine`
//! is that seam; `ProviderEngine` drives a streaming `LlmProvider` and folds
//! its events into one `CompletionReply`. `extract_text` is the single place
//! where a reply is turned into answer text.

use async_trait::async_trait;
use futures::StreamExt;
use pin_utils::pin_mut;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::core::{
    config::GenerationConfig,
    error::LlmError,
    provider::LlmProvider,
    types::{FinishReason, GenerateRequest, Message, StreamEvent, UsageMetadata},
};

/// Reply from a completion engine
///
/// Engines fill whichever of `content`, `text` or `response` they have; any
/// other fields they report land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionReply {
    /// Reply carrying only `content`
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Turn a reply into trimmed answer text
///
/// Takes the first present of `content`, `text`, `response`. When none is
/// present, or the chosen one is blank, falls back to the JSON rendering of
/// the remaining fields. Returns `None` when that is empty too.
pub fn extract_text(reply: &CompletionReply) -> Option<String> {
    let primary = reply
        .content
        .as_deref()
        .or(reply.text.as_deref())
        .or(reply.response.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(text) = primary {
        return Some(text.to_string());
    }

    if reply.extra.is_empty() {
        return None;
    }

    let rendered = Value::Object(reply.extra.clone()).to_string();
    let rendered = rendered.trim();
    (!rendered.is_empty()).then(|| rendered.to_string())
}

/// Black-box completion engine
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Generate a reply for the ordered conversation
    async fn complete(&self, messages: &[Message]) -> Result<CompletionReply, LlmError>;
}

/// Engine backed by a streaming `LlmProvider`
pub struct ProviderEngine {
    provider: Box<dyn LlmProvider>,
    config: GenerationConfig,
    /// Agent instructions sent with every request
    system: Option<String>,
}

impl ProviderEngine {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        config: GenerationConfig,
        system: Option<String>,
    ) -> Self {
        Self {
            provider,
            config,
            system,
        }
    }
}

#[async_trait]
impl CompletionEngine for ProviderEngine {
    async fn complete(&self, messages: &[Message]) -> Result<CompletionReply, LlmError> {
        let request = GenerateRequest {
            messages: messages.to_vec(),
            config: self.config.clone(),
            system: self.system.clone(),
        };

        let stream = self.provider.stream_generate(request).await?;
        pin_mut!(stream);

        let mut text_content = String::new();
        let mut finish_reason: Option<FinishReason> = None;
        let mut usage: Option<UsageMetadata> = None;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::MessageStart { id, model } => {
                    debug!(%id, %model, "Completion started");
                }
                StreamEvent::TextDelta { text } => text_content.push_str(&text),
                StreamEvent::MessageEnd {
                    finish_reason: reason,
                    usage: reported,
                } => {
                    finish_reason = Some(reason);
                    usage = reported;
                    break;
                }
                StreamEvent::Error { error } => return Err(LlmError::StreamError(error)),
            }
        }

        if let Some(usage) = usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                ?finish_reason,
                "Completion finished"
            );
        }

        Ok(CompletionReply::content(text_content))
    }
}
