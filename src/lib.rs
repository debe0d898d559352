// HTTP server modules
pub mod handlers;
pub mod models;
pub mod routes;

// Support pipeline and session state
pub mod error;
pub mod persona;
pub mod service;
pub mod session;

// Process setup
pub mod config;
pub mod telemetry;

// LLM abstraction layer
pub mod llm;
