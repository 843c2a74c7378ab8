use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::constants::{rate_limit, token};

/// Startup configuration problems. Any of these stops the process before it
/// binds a listener.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT secret is not set (security.jwt_secret or JWT_SECRET)")]
    MissingSecret,

    #[error("JWT secret must be at least {min} bytes long (got {len})")]
    SecretTooShort { len: usize, min: usize },

    #[error("rate_limit.requests_per_window must be greater than zero")]
    ZeroRequestLimit,

    #[error("rate_limit.window_seconds must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.sweep_interval_seconds must be greater than zero")]
    ZeroSweepInterval,

    #[error("Invalid trusted proxy IP: {0}")]
    InvalidProxyIp(String),

    #[error("Invalid Argon2 params: {0}")]
    InvalidArgon2Params(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub rate_limit: RateLimitConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads. 0 uses the number of CPU cores.
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/gatehouse.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 0,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// HMAC key for access tokens. Prefer supplying it through `JWT_SECRET`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub jwt_secret: String,

    /// Argon2 memory cost in KiB.
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations).
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("argon2_memory_cost_kib", &self.argon2_memory_cost_kib)
            .field("argon2_time_cost", &self.argon2_time_cost)
            .field("argon2_parallelism", &self.argon2_parallelism)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per client per window.
    pub requests_per_window: u32,

    pub window_seconds: u64,

    /// How often idle client entries are swept from memory.
    pub sweep_interval_seconds: u64,

    /// Proxies allowed to supply the client address via `X-Forwarded-For`.
    ///
    /// When empty, forwarded headers are ignored and the socket peer address
    /// is the client key.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: rate_limit::DEFAULT_REQUESTS_PER_WINDOW,
            window_seconds: rate_limit::DEFAULT_WINDOW.as_secs(),
            sweep_interval_seconds: rate_limit::DEFAULT_SWEEP_INTERVAL.as_secs(),
            trusted_proxy_ips: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn trusted_proxies(&self) -> Result<Vec<IpAddr>, ConfigError> {
        self.trusted_proxy_ips
            .iter()
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidProxyIp(raw.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            json_logs: false,
        }
    }
}

impl Config {
    /// Load the first config file found, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Override file values from environment-style lookups.
    ///
    /// Recognised keys: `JWT_SECRET`, `DATABASE_URL`, `PORT`,
    /// `RATE_LIMIT_REQUESTS`, `LOG_LEVEL`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("JWT_SECRET") {
            self.security.jwt_secret = secret;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            self.general.database_url = url;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.general.log_level = level;
        }

        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "PORT",
                value: port.clone(),
            })?;
        }

        if let Some(limit) = lookup("RATE_LIMIT_REQUESTS") {
            self.rate_limit.requests_per_window =
                limit.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    key: "RATE_LIMIT_REQUESTS",
                    value: limit.clone(),
                })?;
        }

        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![Self::default_config_path()];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("gatehouse").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".gatehouse").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Check everything the service needs before it may serve requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_secret(&self.security.jwt_secret)?;

        if self.rate_limit.requests_per_window == 0 {
            return Err(ConfigError::ZeroRequestLimit);
        }
        if self.rate_limit.window_seconds == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.rate_limit.sweep_interval_seconds == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        self.rate_limit.trusted_proxies()?;

        crate::domain::PasswordHasher::from_config(&self.security)
            .map_err(|e| ConfigError::InvalidArgon2Params(e.to_string()))?;

        Ok(())
    }
}

pub(crate) const fn validate_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.is_empty() {
        return Err(ConfigError::MissingSecret);
    }
    if secret.len() < token::MIN_SECRET_BYTES {
        return Err(ConfigError::SecretTooShort {
            len: secret.len(),
            min: token::MIN_SECRET_BYTES,
        });
    }
    Ok(())
}
