//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use postspace_shared::constants::{DEFAULT_EMBEDDING_URL, DEFAULT_HTTP_PORT};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None`, meaning the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Base URL of the embedding service.
    /// Env: `EMBEDDING_URL`
    pub embedding_url: String,

    /// Upper bound for one embedding request.
    /// Env: `EMBEDDING_TIMEOUT_SECS`
    /// Default: 10 s
    pub embedding_timeout: Duration,

    /// Base URL of the identity provider used to verify sessions.
    /// Env: `AUTH_URL`
    pub auth_url: String,

    /// API key sent as `apikey` to the identity provider.
    /// Env: `AUTH_API_KEY`
    pub auth_api_key: Option<String>,

    /// Sustained requests per second allowed per client IP.
    /// Env: `RATE_LIMIT_PER_SEC`
    pub rate_limit_per_sec: f64,

    /// Burst size per client IP.
    /// Env: `RATE_LIMIT_BURST`
    pub rate_limit_burst: f64,

    /// Largest accepted request body.
    /// Env: `MAX_BODY_BYTES`
    pub max_body_bytes: usize,

    /// Human-readable name reported by `/health`.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            embedding_url: DEFAULT_EMBEDDING_URL.to_string(),
            embedding_timeout: Duration::from_secs(10),
            auth_url: "http://localhost:9999".to_string(),
            auth_api_key: None,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
            max_body_bytes: 1024 * 1024, // 1 MiB
            instance_name: "postspace".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        parse_into(&lookup, "HTTP_ADDR", &mut config.http_addr);

        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(url) = lookup("EMBEDDING_URL").filter(|u| !u.trim().is_empty()) {
            config.embedding_url = url.trim_end_matches('/').to_string();
        }

        let mut timeout_secs = config.embedding_timeout.as_secs();
        parse_into(&lookup, "EMBEDDING_TIMEOUT_SECS", &mut timeout_secs);
        if timeout_secs == 0 {
            tracing::warn!("EMBEDDING_TIMEOUT_SECS must be positive, using default");
        } else {
            config.embedding_timeout = Duration::from_secs(timeout_secs);
        }

        if let Some(url) = lookup("AUTH_URL").filter(|u| !u.trim().is_empty()) {
            config.auth_url = url.trim_end_matches('/').to_string();
        }

        if let Some(key) = lookup("AUTH_API_KEY") {
            if !key.is_empty() {
                config.auth_api_key = Some(key);
            }
        }

        parse_into(&lookup, "RATE_LIMIT_PER_SEC", &mut config.rate_limit_per_sec);
        parse_into(&lookup, "RATE_LIMIT_BURST", &mut config.rate_limit_burst);
        parse_into(&lookup, "MAX_BODY_BYTES", &mut config.max_body_bytes);

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Overwrite `target` with the parsed variable, or warn and keep the
/// default when it does not parse.
fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "Invalid value, using default"),
    }
}
