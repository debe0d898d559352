#![allow(dead_code)]

use async_trait::async_trait;
use crypto_support::llm::{CompletionEngine, CompletionReply, LlmError, Message};
use crypto_support::routes::{configure_routes, HttpSettings};
use crypto_support::service::SupportService;
use crypto_support::session::{ConnectionManager, RateLimitConfig, RateLimiter, SessionStore};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use warp::Filter;

/// Origin allowed by the default HTTP settings
pub const FRONTEND_ORIGIN: &str = "http://localhost:3000";

enum StubReply {
    Json(Value),
    Fail,
}

/// Completion engine returning a canned reply and recording every call
pub struct StubEngine {
    reply: StubReply,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl StubEngine {
    /// Reply with a JSON object, e.g. `{"content": "..."}`
    pub fn replying(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply: StubReply::Json(reply),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: StubReply::Fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionEngine for StubEngine {
    async fn complete(&self, messages: &[Message]) -> Result<CompletionReply, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            StubReply::Json(value) => Ok(serde_json::from_value(value.clone())?),
            StubReply::Fail => Err(LlmError::HttpError {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        }
    }
}

/// Service over `engine` with a `limit`-per-minute quota
pub fn build_service(engine: Arc<StubEngine>, limit: u32) -> Arc<SupportService> {
    let connections = ConnectionManager::new(
        SessionStore::default(),
        RateLimiter::new(RateLimitConfig {
            limit,
            window: Duration::from_secs(60),
        }),
    );
    Arc::new(SupportService::new(
        engine,
        Arc::new(connections),
        Duration::from_secs(5),
    ))
}

/// Full route tree with default HTTP settings
pub fn api(
    service: Arc<SupportService>,
) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
    api_with(service, HttpSettings::default())
}

pub fn api_with(
    service: Arc<SupportService>,
    settings: HttpSettings,
) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
    configure_routes(service, &settings)
}

/// Serve the route tree on an ephemeral local port
pub async fn spawn_server(service: Arc<SupportService>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Missing local address");
    tokio::spawn(warp::serve(api(service)).incoming(listener).run());
    addr
}

/// Wait for every session to be torn down
pub async fn wait_until_disconnected(connections: &ConnectionManager) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while connections.connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session was not torn down");
}
