// POST /ask handler

use crate::error::SupportError;
use crate::handlers::error_reply;
use crate::models::{AskRequest, AskResponse};
use crate::service::SupportService;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::http::StatusCode;

pub async fn ask_handler(
    identity: String,
    request: AskRequest,
    service: Arc<SupportService>,
) -> Result<impl warp::Reply, Infallible> {
    let question = request.question_text();
    info!(%identity, chars = question.chars().count(), "POST /ask");

    match service.ask(&identity, &question).await {
        Ok(response) => Ok(warp::reply::with_status(
            warp::reply::json(&AskResponse { response }),
            StatusCode::OK,
        )),
        Err(err) => {
            match &err {
                SupportError::InvalidInput(_) | SupportError::RateLimited => {
                    warn!(%identity, error = %err, "Rejected /ask request")
                }
                _ => error!(%identity, error = %err, "Failed to answer /ask request"),
            }
            Ok(error_reply(err.status(), err.to_string()))
        }
    }
}
