// Request and response bodies for the HTTP API

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /ask`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskRequest {
    /// Normally a string; other JSON values are accepted and coerced to text
    #[serde(default)]
    pub question: Option<Value>,
}

impl AskRequest {
    /// The question as text; empty when missing or null
    pub fn question_text(&self) -> String {
        match &self.question {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Successful `POST /ask` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

/// Error body for every failed HTTP request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Informational body for `/` and the preflight acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
