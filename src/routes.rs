// Route definitions and rejection handling

use crate::config::{Config, DEFAULT_ALLOWED_ORIGINS};
use crate::handlers::{self, error_reply};
use crate::service::SupportService;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Largest accepted `/ask` body
pub const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Request headers a cross-origin caller may send. Warp's CORS builder only
/// takes explicit names, so this stands in for a wildcard.
pub const ALLOWED_HEADERS: [&str; 8] = [
    "accept",
    "accept-language",
    "authorization",
    "cache-control",
    "content-language",
    "content-type",
    "origin",
    "x-requested-with",
];

/// Identity used when neither a forwarded address nor a peer address is known
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// HTTP-facing settings
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub allowed_origins: Vec<String>,
    pub trust_forwarded_for: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            trust_forwarded_for: false,
        }
    }
}

impl From<&Config> for HttpSettings {
    fn from(config: &Config) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

pub fn configure_routes(
    service: Arc<SupportService>,
    settings: &HttpSettings,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    let identity = client_identity(settings.trust_forwarded_for);

    // GET /
    let welcome = warp::path::end()
        .and(warp::get())
        .and_then(handlers::welcome_handler);

    // POST /ask
    let ask = warp::path("ask")
        .and(warp::path::end())
        .and(warp::post())
        .and(identity.clone())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(handlers::ask_handler);

    // OPTIONS /ask
    let preflight = warp::path("ask")
        .and(warp::path::end())
        .and(warp::options())
        .and_then(handlers::preflight_handler);

    // GET /ws
    let chat = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(identity)
        .and(with_service(service))
        .and_then(handlers::ws_handler);

    let cors = warp::cors()
        .allow_origins(settings.allowed_origins.iter().map(String::as_str))
        .allow_credentials(true)
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(ALLOWED_HEADERS);

    // Requests from other origins are still served, only without CORS
    // headers; the browser enforces the policy. `/ws` is not subject to CORS.
    let allowed: Arc<[String]> = settings.allowed_origins.clone().into();
    let http = welcome.or(ask).or(preflight);
    let cors_http = origin_matches(allowed.clone(), false).and(http.clone().with(cors));
    let foreign_http = origin_matches(allowed, true).and(http);

    cors_http
        .or(foreign_http)
        .or(chat)
        .recover(handle_rejection)
}

/// Passes when the request's `Origin` is foreign (`foreign == true`) or is
/// allowed or absent (`foreign == false`); rejects as not found otherwise
fn origin_matches(
    allowed: Arc<[String]>,
    foreign: bool,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("origin")
        .and_then(move |origin: Option<String>| {
            let is_foreign = origin.is_some_and(|o| !allowed.iter().any(|a| *a == o));
            async move {
                if is_foreign == foreign {
                    Ok(())
                } else {
                    Err(warp::reject::not_found())
                }
            }
        })
        .untuple_one()
}

fn with_service(
    service: Arc<SupportService>,
) -> impl Filter<Extract = (Arc<SupportService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// Rate-limit key for the caller
fn client_identity(
    trust_forwarded_for: bool,
) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-for")
        .and(warp::addr::remote())
        .map(move |forwarded: Option<String>, remote: Option<SocketAddr>| {
            resolve_identity(trust_forwarded_for, forwarded.as_deref(), remote)
        })
}

/// First `X-Forwarded-For` entry when trusted, else the peer IP, else `"unknown"`
pub fn resolve_identity(
    trust_forwarded_for: bool,
    forwarded: Option<&str>,
    remote: Option<SocketAddr>,
) -> String {
    let forwarded = forwarded
        .filter(|_| trust_forwarded_for)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match (forwarded, remote) {
        (Some(first), _) => first.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN_IDENTITY.to_string(),
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected a JSON body".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else if let Some(e) = err.find::<warp::filters::cors::CorsForbidden>() {
        // Preflight asking for a method or header outside the allow-list
        (StatusCode::FORBIDDEN, e.to_string())
    } else if err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
    {
        (StatusCode::BAD_REQUEST, "Bad Request".to_string())
    } else {
        error!(rejection = ?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(error_reply(status, detail))
}
