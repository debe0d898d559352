//! LLM Abstraction Layer
//!
//! This module provides a unified interface for chat models and the
//! completion-engine seam the support service talks to.

pub mod core;
pub mod engine;
pub mod groq;

// Re-export commonly used types
pub use core::{
    config::GenerationConfig,
    error::LlmError,
    provider::{create_provider, LlmProvider},
    types::{FinishReason, GenerateRequest, Message, MessageRole, Model, StreamEvent, UsageMetadata},
};

pub use engine::{extract_text, CompletionEngine, CompletionReply, ProviderEngine};
pub use groq::{GroqClient, GroqModel};
