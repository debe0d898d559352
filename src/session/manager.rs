//! Live connection registry
//!
//! `ConnectionManager` is the only owner of session state. It pairs every
//! session with the handle used to push frames to its socket, and tears both
//! down together.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::rate_limit::RateLimiter;
use super::store::{SessionId, SessionStore};

/// Close code sent to every socket on server shutdown (going away)
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Frame queued for a client socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// Transport-side handle for one connection
///
/// Frames are queued to the socket writer task; the token is cancelled when
/// the connection is torn down so in-flight work can stop.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            outbound,
            cancel: CancellationToken::new(),
        }
    }

    /// Handle plus the receiving end its writer task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue a text frame; false if the writer is gone
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.outbound.send(Outbound::Text(text.into())).is_ok()
    }

    /// Queue a close frame; false if the writer is gone
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.outbound
            .send(Outbound::Close {
                code,
                reason: reason.into(),
            })
            .is_ok()
    }

    /// Token cancelled on teardown
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Single authority over live sessions and their connections
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: DashMap<SessionId, ConnectionHandle>,
    sessions: SessionStore,
    rate_limiter: RateLimiter,
}

impl ConnectionManager {
    pub fn new(sessions: SessionStore, rate_limiter: RateLimiter) -> Self {
        Self {
            connections: DashMap::new(),
            sessions,
            rate_limiter,
        }
    }

    /// Register an accepted connection and open its session
    pub fn connect(&self, handle: ConnectionHandle) -> SessionId {
        let id = self.sessions.create();
        self.connections.insert(id, handle);
        info!(session_id = %id, live = self.connections.len(), "Session opened");
        id
    }

    /// Tear down a connection and its session
    ///
    /// Safe to call from any exit path; only the first call does anything
    /// and returns true.
    pub fn disconnect(&self, id: SessionId) -> bool {
        let handle = self.connections.remove(&id).map(|(_, handle)| handle);
        if let Some(handle) = &handle {
            handle.cancel();
        }

        let age_secs = self
            .sessions
            .created_at(id)
            .map(|created| (Utc::now() - created).num_seconds());
        let destroyed = self.sessions.destroy(id);
        let removed = handle.is_some() || destroyed;
        if removed {
            info!(
                session_id = %id,
                ?age_secs,
                live = self.connections.len(),
                "Session closed"
            );
        }
        removed
    }

    /// Per-identity quota check, shared by every session from that identity
    pub fn check_rate_limit(&self, identity: &str) -> bool {
        self.rate_limiter.allow(identity)
    }

    /// Close every live connection and forget every session
    ///
    /// Returns the number of connections that were closed.
    pub fn shutdown(&self) -> usize {
        let ids: Vec<SessionId> = self.connections.iter().map(|entry| *entry.key()).collect();

        let mut closed = 0;
        for id in ids {
            if let Some((_, handle)) = self.connections.remove(&id) {
                if !handle.close(CLOSE_GOING_AWAY, "Server shutting down") {
                    debug!(session_id = %id, "Writer already gone at shutdown");
                }
                handle.cancel();
                closed += 1;
            }
        }

        self.connections.clear();
        self.sessions.clear();
        info!(closed, "Connection manager shut down");
        closed
    }

    /// Drop expired rate-limit records every `period` until the task is aborted
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.rate_limiter.sweep_expired(Instant::now());
            }
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Handle registered for `id`, if the connection is still live
    pub fn handle(&self, id: SessionId) -> Option<ConnectionHandle> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    pub fn is_connected(&self, id: SessionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Message, MessageRole};
    use crate::session::rate_limit::RateLimitConfig;
    use crate::session::store::SESSION_SEED_PROMPT;
    use std::collections::HashSet;

    #[test]
    fn test_connect_registers_handle_and_seeds_session() {
        let manager = ConnectionManager::default();
        let (handle, _rx) = ConnectionHandle::channel();

        let id = manager.connect(handle);

        assert!(manager.is_connected(id));
        assert_eq!(manager.connection_count(), 1);
        assert_eq!(
            manager.sessions().history(id).unwrap(),
            vec![Message::system(SESSION_SEED_PROMPT)]
        );
    }

    #[test]
    fn test_disconnect_is_idempotent_and_cancels() {
        let manager = ConnectionManager::default();
        let (handle, _rx) = ConnectionHandle::channel();
        let token = handle.cancellation();
        let id = manager.connect(handle);

        assert!(manager.disconnect(id));
        assert!(token.is_cancelled());
        assert!(!manager.is_connected(id));
        assert!(!manager.sessions().contains(id));
        assert!(manager.handle(id).is_none());

        assert!(!manager.disconnect(id));
    }

    #[test]
    fn test_append_after_disconnect_fails() {
        let manager = ConnectionManager::default();
        let (handle, _rx) = ConnectionHandle::channel();
        let id = manager.connect(handle);
        manager.disconnect(id);

        assert!(manager
            .sessions()
            .append(id, MessageRole::Assistant, "late reply")
            .is_err());
    }

    #[test]
    fn test_rate_limit_is_shared_across_sessions_from_one_identity() {
        let manager = ConnectionManager::new(
            SessionStore::default(),
            RateLimiter::new(RateLimitConfig {
                limit: 3,
                window: std::time::Duration::from_secs(60),
            }),
        );
        let (first, _rx1) = ConnectionHandle::channel();
        let (second, _rx2) = ConnectionHandle::channel();
        manager.connect(first);
        manager.connect(second);

        // Two sessions, one address: the quota is spent jointly
        assert!(manager.check_rate_limit("9.9.9.9"));
        assert!(manager.check_rate_limit("9.9.9.9"));
        assert!(manager.check_rate_limit("9.9.9.9"));
        assert!(!manager.check_rate_limit("9.9.9.9"));
        assert!(manager.check_rate_limit("8.8.8.8"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_every_connection() {
        let manager = ConnectionManager::default();
        let (first, mut rx1) = ConnectionHandle::channel();
        let (second, mut rx2) = ConnectionHandle::channel();
        let token = first.cancellation();
        manager.connect(first);
        manager.connect(second);

        assert_eq!(manager.shutdown(), 2);

        assert_eq!(manager.connection_count(), 0);
        assert!(manager.sessions().is_empty());
        assert!(token.is_cancelled());
        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await {
                Some(Outbound::Close { code, .. }) => assert_eq!(code, CLOSE_GOING_AWAY),
                other => panic!("Expected close frame, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_shutdown_tolerates_dropped_writers() {
        let manager = ConnectionManager::default();
        let (handle, rx) = ConnectionHandle::channel();
        drop(rx);
        manager.connect(handle);

        assert_eq!(manager.shutdown(), 1);
        assert_eq!(manager.shutdown(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_connects_get_distinct_ids() {
        let manager = Arc::new(ConnectionManager::default());

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    let (handle, _rx) = ConnectionHandle::channel();
                    manager.connect(handle)
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for task in tasks {
            assert!(ids.insert(task.await.unwrap()));
        }
        assert_eq!(manager.connection_count(), 100);
    }

    #[test]
    fn test_handle_send_after_receiver_dropped() {
        let (handle, rx) = ConnectionHandle::channel();
        assert!(handle.send_text("hello"));
        drop(rx);
        assert!(!handle.send_text("hello"));
        assert!(!handle.close(1000, "bye"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_forgets_idle_identities() {
        let manager = Arc::new(ConnectionManager::new(
            SessionStore::default(),
            RateLimiter::new(RateLimitConfig {
                limit: 1,
                window: Duration::from_secs(60),
            }),
        ));
        assert!(manager.check_rate_limit("7.7.7.7"));
        assert_eq!(manager.rate_limiter().tracked(), 1);

        let sweeper = manager.spawn_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(125)).await;

        assert_eq!(manager.rate_limiter().tracked(), 0);
        assert!(manager.check_rate_limit("7.7.7.7"));
        sweeper.abort();
    }
}
