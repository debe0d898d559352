//! Request pipeline shared by `/ask` and `/ws`

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SupportError;
use crate::llm::{extract_text, CompletionEngine, Message, MessageRole};
use crate::session::{ConnectionManager, SessionId};

/// Default bound on one engine call
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(60);

/// Validates input, applies quotas, calls the engine and extracts the answer
pub struct SupportService {
    engine: Arc<dyn CompletionEngine>,
    connections: Arc<ConnectionManager>,
    engine_timeout: Duration,
}

impl SupportService {
    pub fn new(
        engine: Arc<dyn CompletionEngine>,
        connections: Arc<ConnectionManager>,
        engine_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            connections,
            engine_timeout,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// One-shot question without history
    pub async fn ask(&self, identity: &str, question: &str) -> Result<String, SupportError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SupportError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        if !self.connections.check_rate_limit(identity) {
            return Err(SupportError::RateLimited);
        }

        self.complete(&[Message::user(question)], None).await
    }

    /// One turn of a duplex session
    ///
    /// The whole history, not just `text`, is sent to the engine. The call is
    /// abandoned if the session is torn down while it is in flight.
    pub async fn turn(
        &self,
        session: SessionId,
        identity: &str,
        text: &str,
    ) -> Result<String, SupportError> {
        if !self.connections.check_rate_limit(identity) {
            return Err(SupportError::RateLimited);
        }

        let cancel = self
            .connections
            .handle(session)
            .map(|handle| handle.cancellation())
            .ok_or(SupportError::UnknownSession(session))?;

        let sessions = self.connections.sessions();
        sessions.append(session, MessageRole::User, text)?;
        let history = sessions.history(session)?;
        debug!(session_id = %session, turns = history.len(), "Sending history to engine");

        let answer = self.complete(&history, Some(&cancel)).await?;
        sessions.append(session, MessageRole::Assistant, answer.as_str())?;
        Ok(answer)
    }

    async fn complete(
        &self,
        messages: &[Message],
        cancel: Option<&CancellationToken>,
    ) -> Result<String, SupportError> {
        let call = tokio::time::timeout(self.engine_timeout, self.engine.complete(messages));

        let outcome = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(SupportError::Cancelled),
                outcome = call => outcome,
            },
            None => call.await,
        };

        let reply = outcome.map_err(|_| SupportError::UpstreamTimeout(self.engine_timeout))??;
        extract_text(&reply).ok_or(SupportError::EmptyCompletion)
    }
}
