//! Session bookkeeping: rate limiting, conversation history, live connections

pub mod manager;
pub mod rate_limit;
pub mod store;

pub use manager::{ConnectionHandle, ConnectionManager, Outbound, CLOSE_GOING_AWAY};
pub use rate_limit::{RateLimitConfig, RateLimitRecord, RateLimiter};
pub use store::{Session, SessionId, SessionStore, DEFAULT_MAX_HISTORY, SESSION_SEED_PROMPT};
