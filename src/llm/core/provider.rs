//! Provider trait for LLM implementations

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use super::{
    error::LlmError,
    types::{GenerateRequest, Model, StreamEvent},
};
use crate::llm::groq::GroqClient;

/// Boxed stream of provider events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Main interface that all LLM provider implementations must satisfy
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream generate content from the LLM
    ///
    /// Sends the request and returns a stream of events representing the
    /// incremental response. Errors before the first byte (auth, HTTP status)
    /// are returned directly; errors mid-stream are yielded as items.
    async fn stream_generate(&self, request: GenerateRequest) -> Result<EventStream, LlmError>;
}

/// Create an LLM provider for the given model
///
/// # Example
///
/// ```rust,no_run
/// use crypto_support::llm::{create_provider, GroqModel, Model};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = create_provider(
///     Model::Groq(GroqModel::Llama33Versatile),
///     "gsk_...".to_string(),
///     "https://api.groq.com/openai/v1".to_string(),
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn create_provider(
    model: Model,
    api_key: String,
    base_url: String,
) -> Result<Box<dyn LlmProvider>, LlmError> {
    match model {
        Model::Groq(groq_model) => {
            let client = GroqClient::new(api_key, base_url, groq_model)?;
            Ok(Box::new(client))
        }
    }
}
