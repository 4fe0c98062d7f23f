//! Configuration management for Waitroom
//!
//! Configuration comes from a TOML file or from environment variables layered
//! over the defaults. Either way it is validated before use.

use crate::admission::DEFAULT_STORE_TIMEOUT;
use crate::scheduler::SchedulerConfig;
use crate::token::{DigestAlgorithm, DEFAULT_TOKEN_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Queue store configuration
    pub store: StoreConfig,

    /// Admission scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Token configuration
    pub token: TokenConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Grace period for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Which queue store backend to run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, lost on restart
    Memory,
    /// SQLite file, shared by every process pointing at it
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(ConfigError::InvalidValue(format!("Unknown store backend: {}", other))),
        }
    }
}

/// Queue store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database file for the sqlite backend
    pub path: Option<PathBuf>,

    /// Maximum pooled connections for the sqlite backend
    pub pool_size: u32,

    /// Deadline for a single store call
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
}

/// Token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Prefix hashed into every token and used in cookie names
    pub namespace: String,

    /// Digest algorithm name
    pub algorithm: String,

    /// Lifetime of the token cookie
    #[serde(with = "humantime_serde")]
    pub cookie_max_age: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus endpoint
    pub enabled: bool,

    /// Prometheus scrape address
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            pool_size: 8,
            operation_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_TOKEN_NAMESPACE.to_string(),
            algorithm: DigestAlgorithm::Sha256.to_string(),
            cookie_max_age: Duration::from_secs(300),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json_format: false, with_target: true }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false, bind_address: SocketAddr::from(([127, 0, 0, 1], 9090)) }
    }
}

/// Read and parse one environment variable, if set
fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

/// Read a humantime duration (`"15s"`, `"500ms"`) from the environment
fn env_duration(name: &str) -> Result<Option<Duration>, ConfigError> {
    match env::var(name) {
        Ok(raw) => humantime_serde::re::humantime::parse_duration(&raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: WAITROOM_<SECTION>_<KEY>
    /// Example: WAITROOM_SERVER_BIND_ADDRESS=0.0.0.0:8080
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server config
        if let Some(addr) = env_parse("WAITROOM_SERVER_BIND_ADDRESS")? {
            config.server.bind_address = addr;
        }
        if let Some(timeout) = env_duration("WAITROOM_SERVER_SHUTDOWN_TIMEOUT")? {
            config.server.shutdown_timeout = timeout;
        }

        // Store config
        if let Some(backend) = env_parse("WAITROOM_STORE_BACKEND")? {
            config.store.backend = backend;
        }
        if let Ok(path) = env::var("WAITROOM_STORE_PATH") {
            config.store.path = Some(PathBuf::from(path));
        }
        if let Some(pool_size) = env_parse("WAITROOM_STORE_POOL_SIZE")? {
            config.store.pool_size = pool_size;
        }
        if let Some(timeout) = env_duration("WAITROOM_STORE_OPERATION_TIMEOUT")? {
            config.store.operation_timeout = timeout;
        }

        // Scheduler config
        if let Some(enabled) = env_parse("WAITROOM_SCHEDULER_ENABLED")? {
            config.scheduler.enabled = enabled;
        }
        if let Some(delay) = env_duration("WAITROOM_SCHEDULER_INITIAL_DELAY")? {
            config.scheduler.initial_delay = delay;
        }
        if let Some(delay) = env_duration("WAITROOM_SCHEDULER_FIXED_DELAY")? {
            config.scheduler.fixed_delay = delay;
        }
        if let Some(batch_size) = env_parse("WAITROOM_SCHEDULER_BATCH_SIZE")? {
            config.scheduler.batch_size = batch_size;
        }
        if let Some(page_size) = env_parse("WAITROOM_SCHEDULER_SCAN_PAGE_SIZE")? {
            config.scheduler.scan_page_size = page_size;
        }

        // Token config
        if let Ok(namespace) = env::var("WAITROOM_TOKEN_NAMESPACE") {
            config.token.namespace = namespace;
        }
        if let Ok(algorithm) = env::var("WAITROOM_TOKEN_ALGORITHM") {
            config.token.algorithm = algorithm;
        }
        if let Some(max_age) = env_duration("WAITROOM_TOKEN_COOKIE_MAX_AGE")? {
            config.token.cookie_max_age = max_age;
        }

        // Logging config
        if let Ok(level) = env::var("WAITROOM_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = env_parse("WAITROOM_LOG_JSON")? {
            config.logging.json_format = json;
        }

        // Metrics config
        if let Some(enabled) = env_parse("WAITROOM_METRICS_ENABLED")? {
            config.metrics.enabled = enabled;
        }
        if let Some(addr) = env_parse("WAITROOM_METRICS_BIND_ADDRESS")? {
            config.metrics.bind_address = addr;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise from the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Store config
        if self.store.pool_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "store.pool_size must be greater than 0".to_string(),
            ));
        }
        if self.store.operation_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "store.operation_timeout must be greater than 0".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.is_none() {
            return Err(ConfigError::ValidationFailed(
                "sqlite backend selected but store.path not provided".to_string(),
            ));
        }

        // Scheduler config
        if self.scheduler.batch_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "scheduler.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.scan_page_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "scheduler.scan_page_size must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.fixed_delay.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "scheduler.fixed_delay must be greater than 0".to_string(),
            ));
        }

        // Token config
        self.token
            .algorithm
            .parse::<DigestAlgorithm>()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        // Logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}
