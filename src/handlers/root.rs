// GET / and OPTIONS /ask handlers

use crate::models::MessageResponse;
use std::convert::Infallible;

pub async fn welcome_handler() -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&MessageResponse {
        message: "Welcome to the Crypto Support Agent API!".to_string(),
    }))
}

/// Plain `OPTIONS /ask`; browser preflights are answered by the CORS layer
pub async fn preflight_handler() -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&MessageResponse {
        message: "CORS preflight".to_string(),
    }))
}
