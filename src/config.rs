//! Runtime configuration loaded from the environment

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::llm::{GenerationConfig, GroqModel};
use crate::session::{RateLimitConfig, DEFAULT_MAX_HISTORY};
use crate::service::DEFAULT_ENGINE_TIMEOUT;

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = [
    "https://pennyfundme5-neon.vercel.app",
    "http://localhost:3000",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Server settings
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub groq_api_key: String,
    pub groq_model: GroqModel,
    pub groq_base_url: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub max_history: usize,
    pub engine_timeout: Duration,
    pub generation: GenerationConfig,
    /// Use the first `X-Forwarded-For` entry as the client identity.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Config {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host: IpAddr = parse_or(&get, "HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port: u16 = parse_or(&get, "PORT", 3030)?;

        let groq_api_key = get("GROQ_API_KEY").ok_or(ConfigError::Missing("GROQ_API_KEY"))?;
        let groq_model = get("GROQ_MODEL")
            .map(|id| GroqModel::from_id(&id))
            .unwrap_or(GroqModel::Llama33Versatile);
        let groq_base_url = get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string());

        let allowed_origins: Vec<String> = match get("ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };
        if let Some(origin) = allowed_origins.iter().find(|o| !o.contains("://")) {
            return Err(invalid("ALLOWED_ORIGINS", origin, "origins need a scheme"));
        }

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            limit: parse_or(&get, "RATE_LIMIT_MAX", defaults.limit)?,
            window: Duration::from_secs(parse_or(
                &get,
                "RATE_LIMIT_WINDOW_SECS",
                defaults.window.as_secs(),
            )?),
        };
        if rate_limit.limit == 0 {
            return Err(invalid("RATE_LIMIT_MAX", "0", "must be at least 1"));
        }
        if rate_limit.window.is_zero() {
            return Err(invalid("RATE_LIMIT_WINDOW_SECS", "0", "must be at least 1"));
        }

        let max_history = parse_or(&get, "MAX_HISTORY_MESSAGES", DEFAULT_MAX_HISTORY)?;
        let engine_timeout = Duration::from_secs(parse_or(
            &get,
            "ENGINE_TIMEOUT_SECS",
            DEFAULT_ENGINE_TIMEOUT.as_secs(),
        )?);
        let mut generation = GenerationConfig::new(parse_or(&get, "MAX_TOKENS", 1024)?);
        if let Some(raw) = get("TEMPERATURE") {
            let temperature: f32 = raw
                .parse()
                .map_err(|e: std::num::ParseFloatError| invalid("TEMPERATURE", &raw, e.to_string()))?;
            if !(0.0..=2.0).contains(&temperature) {
                return Err(invalid("TEMPERATURE", &raw, "must be between 0 and 2"));
            }
            generation = generation.with_temperature(temperature);
        }
        let trust_forwarded_for = parse_bool_or(&get, "TRUST_FORWARDED_FOR", false)?;

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            groq_api_key,
            groq_model,
            groq_base_url,
            allowed_origins,
            rate_limit,
            max_history,
            engine_timeout,
            generation,
            trust_forwarded_for,
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(invalid(key, &v, "expected a boolean")),
    }
}
