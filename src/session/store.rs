//! Per-connection conversation history

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::SupportError;
use crate::llm::{Message, MessageRole};

/// Prompt every session starts with
pub const SESSION_SEED_PROMPT: &str =
    "You are a helpful customer support agent for a crypto platform.";

/// Default cap on stored messages per session, seed message included
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One live conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn seeded(id: SessionId) -> Self {
        Self {
            id,
            history: vec![Message::system(SESSION_SEED_PROMPT)],
            created_at: Utc::now(),
        }
    }

    /// Drop the oldest non-system messages until `max` remain
    fn enforce_cap(&mut self, max: usize) {
        while self.history.len() > max {
            match self
                .history
                .iter()
                .position(|m| m.role != MessageRole::System)
            {
                Some(oldest) => {
                    self.history.remove(oldest);
                }
                None => break,
            }
        }
    }
}

/// Owns the history of every live session
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
    max_history: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl SessionStore {
    /// `max_history` below 2 would leave no room for a turn, so it is raised to 2
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_history: max_history.max(2),
        }
    }

    /// Allocate a new session seeded with the system prompt
    pub fn create(&self) -> SessionId {
        loop {
            let id = SessionId::generate();
            if let Entry::Vacant(slot) = self.sessions.entry(id) {
                slot.insert(Session::seeded(id));
                return id;
            }
        }
    }

    /// Append a message to a live session
    pub fn append(
        &self,
        id: SessionId,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Result<(), SupportError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(SupportError::InvalidInput(
                "message content must not be empty".to_string(),
            ));
        }

        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(SupportError::UnknownSession(id))?;
        session.history.push(Message::new(role, content));
        session.enforce_cap(self.max_history);
        Ok(())
    }

    /// Full ordered history of a live session
    pub fn history(&self, id: SessionId) -> Result<Vec<Message>, SupportError> {
        self.sessions
            .get(&id)
            .map(|session| session.history.clone())
            .ok_or(SupportError::UnknownSession(id))
    }

    /// When the session was created
    pub fn created_at(&self, id: SessionId) -> Option<DateTime<Utc>> {
        self.sessions.get(&id).map(|session| session.created_at)
    }

    /// Remove a session; returns false when it was already gone
    pub fn destroy(&self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove every session
    pub fn clear(&self) {
        self.sessions.clear();
    }
}
