// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    /// Endpoint of the question generation service.
    pub ai_api_url: String,
    pub ai_api_key: Option<String>,
    /// Total calls made to the generator before giving up (first call included).
    pub ai_max_attempts: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub ai_base_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let ai_api_url = env::var("AI_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000/generate".to_string());

        let ai_api_key = env::var("AI_API_KEY").ok();

        let ai_max_attempts = env::var("AI_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let ai_base_delay_ms = env::var("AI_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            ai_api_url,
            ai_api_key,
            ai_max_attempts,
            ai_base_delay_ms,
        }
    }
}
