//! Groq provider implementation
//!
//! This module provides a client for chat models served by Groq's
//! OpenAI-compatible API.

pub mod client;
pub mod mapper;
pub mod sse;
pub mod types;

// Re-export commonly used types
pub use client::{GroqClient, GroqModel};
