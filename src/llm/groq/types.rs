//! Groq-specific request and response types
//!
//! Groq serves an OpenAI-compatible chat completions API; these types map
//! directly to that wire schema.

use serde::{Deserialize, Serialize};

/// Request body for `POST /chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier, e.g. `llama-3.3-70b-versatile`
    pub model: String,
    /// Conversation, system messages first
    pub messages: Vec<GroqMessage>,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Always true; responses arrive as SSE chunks
    pub stream: bool,
}

/// A single chat message on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroqMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

/// One `data:` payload of the streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Groq reports usage here on the final chunk
    #[serde(default)]
    pub x_groq: Option<GroqExtension>,
    /// OpenAI-style usage field, present when `stream_options.include_usage` is honored
    #[serde(default)]
    pub usage: Option<GroqUsage>,
}

/// A streamed choice
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    pub index: usize,
    #[serde(default)]
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// Incremental message content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    pub role: Option<String>,
    pub content: Option<String>,
}

/// Groq's vendor extension object
#[derive(Debug, Clone, Deserialize)]
pub struct GroqExtension {
    pub id: Option<String>,
    pub usage: Option<GroqUsage>,
}

/// Token usage
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GroqUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct GroqErrorEnvelope {
    pub error: GroqErrorData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroqErrorData {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
}
