use std::env;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use dotenvy::dotenv;

/// Global Config stored in a `OnceLock`
static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub lock_timeout: Duration,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Load environment variables and set defaults
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env only once

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            token_ttl_secs: env::var("TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(36_000), // 10 hour expiration
            lock_timeout: Duration::from_millis(
                env::var("LOCK_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(250),
            ),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        })
    }

    /// Initialize the global config; later calls are no-ops.
    pub fn init() -> anyhow::Result<()> {
        if CONFIG.get().is_some() {
            return Ok(());
        }
        let config = Self::from_env()?;
        let _ = CONFIG.set(Arc::new(config));
        Ok(())
    }

    /// Safe access to Config
    pub fn get() -> Arc<Config> {
        CONFIG.get().expect("Config not initialized").clone()
    }
}
