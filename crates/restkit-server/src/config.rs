//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;

use restkit_common::RestkitError;
use serde::{Deserialize, Serialize};

use crate::db::DbConfig;
use crate::query::{QueryRules, DEFAULT_KEYWORD_PATTERN};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Default cap on buffered request bodies (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Default number of idle request contexts kept for reuse.
pub const DEFAULT_POOL_MAX_IDLE: usize = 256;

/// Default directory for the file audit sink.
pub const DEFAULT_AUDIT_DIR: &str = "./log/audit";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub cors: CorsConfig,
    pub request: RequestConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Per-request handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub max_body_bytes: usize,
    pub pool_enabled: bool,
    pub pool_max_idle: usize,
    pub keyword_pattern: String,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    Tracing,
    File,
}

impl FromStr for AuditSinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tracing" | "log" => Ok(Self::Tracing),
            "file" => Ok(Self::File),
            other => Err(format!("Unknown audit sink: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
    pub dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            allow_credentials: true,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::Tracing,
            dir: PathBuf::from(DEFAULT_AUDIT_DIR),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            pool_enabled: true,
            pool_max_idle: DEFAULT_POOL_MAX_IDLE,
            keyword_pattern: DEFAULT_KEYWORD_PATTERN.to_string(),
            audit: AuditConfig::default(),
        }
    }
}

impl RequestConfig {
    /// Compile the configured query validation rules
    pub fn query_rules(&self) -> anyhow::Result<QueryRules> {
        QueryRules::with_keyword_pattern(&self.keyword_pattern).map_err(|e| {
            anyhow::anyhow!("Invalid keyword pattern '{}': {}", self.keyword_pattern, e)
        })
    }
}

/// Parse `name` if set. A value that does not parse is an error.
fn env_or<T: FromStr>(name: &str, default: T) -> restkit_common::Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RestkitError::config(format!("Invalid value for {}: '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Read configuration from the process environment without validating
    pub fn from_env() -> anyhow::Result<Self> {
        let server_defaults = ServerConfig::default();
        let request_defaults = RequestConfig::default();

        let audit_sink = match std::env::var("RESTKIT_AUDIT_SINK") {
            Ok(value) => value.parse().map_err(anyhow::Error::msg)?,
            Err(_) => request_defaults.audit.sink,
        };

        Ok(Config {
            server: ServerConfig {
                host: std::env::var("RESTKIT_HOST").unwrap_or(server_defaults.host),
                port: env_or("RESTKIT_PORT", server_defaults.port)?,
                shutdown_timeout_secs: env_or(
                    "RESTKIT_SHUTDOWN_TIMEOUT",
                    server_defaults.shutdown_timeout_secs,
                )?,
            },
            database: DbConfig::from_env()?,
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true)?,
            },
            request: RequestConfig {
                max_body_bytes: env_or("RESTKIT_MAX_BODY_BYTES", request_defaults.max_body_bytes)?,
                pool_enabled: env_or("RESTKIT_CONTEXT_POOL", request_defaults.pool_enabled)?,
                pool_max_idle: env_or(
                    "RESTKIT_CONTEXT_POOL_MAX_IDLE",
                    request_defaults.pool_max_idle,
                )?,
                keyword_pattern: std::env::var("RESTKIT_KEYWORD_PATTERN")
                    .unwrap_or(request_defaults.keyword_pattern),
                audit: AuditConfig {
                    sink: audit_sink,
                    dir: std::env::var("RESTKIT_AUDIT_DIR")
                        .map(PathBuf::from)
                        .unwrap_or(request_defaults.audit.dir),
                },
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.request.max_body_bytes == 0 {
            anyhow::bail!("Request max_body_bytes must be greater than 0");
        }

        self.request.query_rules()?;

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DbConfig::default(),
            cors: CorsConfig::default(),
            request: RequestConfig::default(),
        }
    }
}
