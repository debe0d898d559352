// GET /ws handler: one chat session per socket

use crate::error::SupportError;
use crate::service::SupportService;
use crate::session::{ConnectionHandle, ConnectionManager, Outbound, SessionId};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use warp::ws::{Message, WebSocket, Ws};

pub const RATE_LIMIT_WARNING: &str = "⚠️ Too many requests. Please wait a minute.";
pub const ERROR_WARNING: &str = "⚠️ An error occurred. Please try again later.";

/// Policy violation
pub const CLOSE_RATE_LIMITED: u16 = 1008;
/// Internal error
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

pub async fn ws_handler(
    ws: Ws,
    identity: String,
    service: Arc<SupportService>,
) -> Result<impl warp::Reply, Infallible> {
    Ok(ws.on_upgrade(move |socket| run_session(socket, identity, service)))
}

/// Disconnects its session when dropped, whichever way the loop exits
struct SessionGuard {
    connections: Arc<ConnectionManager>,
    id: SessionId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.connections.disconnect(self.id);
    }
}

async fn run_session(socket: WebSocket, identity: String, service: Arc<SupportService>) {
    let (sink, mut frames) = socket.split();
    let (handle, outbound) = ConnectionHandle::channel();
    let writer = tokio::spawn(write_frames(sink, outbound));

    let cancel = handle.cancellation();
    let session_id = service.connections().connect(handle.clone());
    let guard = SessionGuard {
        connections: service.connections().clone(),
        id: session_id,
    };
    info!(%session_id, %identity, "WebSocket connected");

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.next() => frame,
        };

        let message = match frame {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(%session_id, error = %e, "WebSocket receive failed");
                break;
            }
            None => break,
        };

        if message.is_close() {
            debug!(%session_id, "Client closed the socket");
            break;
        }
        // Binary, ping and pong frames carry no chat text
        let Ok(text) = message.to_str() else {
            continue;
        };

        match service.turn(session_id, &identity, text).await {
            Ok(answer) => {
                if !handle.send_text(answer) {
                    break;
                }
            }
            Err(SupportError::RateLimited) => {
                warn!(%session_id, %identity, "Rate limit exceeded, closing socket");
                handle.send_text(RATE_LIMIT_WARNING);
                handle.close(CLOSE_RATE_LIMITED, "Rate limit exceeded");
                break;
            }
            Err(SupportError::Cancelled) => break,
            Err(err) => {
                error!(%session_id, error = %err, "Chat turn failed, closing socket");
                handle.send_text(ERROR_WARNING);
                handle.close(CLOSE_INTERNAL_ERROR, "Internal error");
                break;
            }
        }
    }

    drop(guard);
    // The writer stops once every sender is gone and the queue is drained
    drop(handle);
    if let Err(e) = writer.await {
        warn!(%session_id, error = %e, "WebSocket writer task failed");
    }
    info!(%session_id, "WebSocket disconnected");
}

async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    outbound: tokio::sync::mpsc::UnboundedReceiver<Outbound>,
) {
    let mut outbound = UnboundedReceiverStream::new(outbound);

    while let Some(frame) = outbound.next().await {
        let (message, closing) = match frame {
            Outbound::Text(text) => (Message::text(text), false),
            Outbound::Close { code, reason } => (Message::close_with(code, reason), true),
        };

        if let Err(e) = sink.send(message).await {
            debug!(error = %e, "WebSocket send failed");
            return;
        }
        if closing {
            break;
        }
    }

    let _ = sink.close().await;
}
