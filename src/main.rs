use crypto_support::config::Config;
use crypto_support::llm::{create_provider, Model, ProviderEngine};
use crypto_support::routes::{configure_routes, HttpSettings};
use crypto_support::service::SupportService;
use crypto_support::session::{ConnectionManager, RateLimiter, SessionStore};
use crypto_support::{persona, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Time allowed for queued close frames to reach clients at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let provider = match create_provider(
        Model::Groq(config.groq_model.clone()),
        config.groq_api_key.clone(),
        config.groq_base_url.clone(),
    ) {
        Ok(provider) => provider,
        Err(e) => {
            error!(error = %e, "Failed to create LLM provider");
            std::process::exit(1);
        }
    };
    let engine = Arc::new(ProviderEngine::new(
        provider,
        config.generation.clone(),
        Some(persona::system_prompt()),
    ));

    let connections = Arc::new(ConnectionManager::new(
        SessionStore::new(config.max_history),
        RateLimiter::new(config.rate_limit),
    ));
    let sweeper = connections.spawn_sweeper(config.rate_limit.window);

    let service = Arc::new(SupportService::new(
        engine,
        connections.clone(),
        config.engine_timeout,
    ));
    let routes = configure_routes(service, &HttpSettings::from(&config));

    info!(
        model = config.groq_model.as_str(),
        "Starting server on http://{}", config.bind_addr
    );
    tokio::select! {
        _ = warp::serve(routes).run(config.bind_addr) => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        },
    }

    sweeper.abort();
    let closed = connections.shutdown();
    info!(closed, "Closed live sessions");
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
