//! Errors surfaced by the support service

use std::time::Duration;
use thiserror::Error;
use warp::http::StatusCode;

use crate::llm::core::types::UnknownRole;
use crate::llm::LlmError;
use crate::session::SessionId;

/// Failures of a single `/ask` request or `/ws` turn
#[derive(Debug, Error)]
pub enum SupportError {
    /// Empty or malformed request text
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller's quota for the current window is spent
    #[error("Too many requests. Please try again later.")]
    RateLimited,

    /// Operation named a session that is not live (internal bug if seen)
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// Engine replied but no text could be extracted
    #[error("The support agent returned an empty response")]
    EmptyCompletion,

    /// Engine call failed
    #[error("Upstream failure: {0}")]
    Upstream(#[from] LlmError),

    /// Engine call did not finish in time
    #[error("Upstream failure: no response within {0:?}")]
    UpstreamTimeout(Duration),

    /// Session closed while the engine call was in flight
    #[error("Session closed before the reply arrived")]
    Cancelled,
}

impl SupportError {
    /// HTTP status reported for this error on `/ask`
    pub fn status(&self) -> StatusCode {
        match self {
            SupportError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SupportError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            SupportError::UnknownSession(_)
            | SupportError::EmptyCompletion
            | SupportError::Upstream(_)
            | SupportError::UpstreamTimeout(_)
            | SupportError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UnknownRole> for SupportError {
    fn from(err: UnknownRole) -> Self {
        SupportError::InvalidInput(err.to_string())
    }
}
