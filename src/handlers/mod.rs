// Handlers module

pub mod ask;
pub mod root;
pub mod ws;

pub use ask::ask_handler;
pub use root::{preflight_handler, welcome_handler};
pub use ws::ws_handler;

use crate::models::ErrorResponse;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

/// `{"detail": ...}` body with the given status
pub fn error_reply(status: StatusCode, detail: impl Into<String>) -> WithStatus<Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            detail: detail.into(),
        }),
        status,
    )
}
