//! Database configuration and pooling
//!
//! A [`DbConfig`] is either a full `DATABASE_URL` or a set of connection
//! components (`DB_HOST`, `DB_PORT`, ...) assembled into a Postgres URL.
//! Named pools are kept in a [`registry::ConnectionRegistry`].

pub mod registry;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Database configuration is invalid or missing
    #[error("Database configuration error: {0}. Check DATABASE_URL or DB_* connection settings.")]
    Config(String),
}

impl DbError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Individual connection settings used when no URL is given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

impl Default for ConnectionParts {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "restkit".to_string(),
            ssl_mode: "disable".to_string(),
        }
    }
}

impl ConnectionParts {
    pub fn to_url(&self) -> String {
        let mut url = format!("postgresql://{}", self.user);
        if !self.password.is_empty() {
            url.push(':');
            url.push_str(&self.password);
        }
        url.push_str(&format!(
            "@{}:{}/{}?sslmode={}",
            self.host, self.port, self.database, self.ssl_mode
        ));
        url
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: ConnectionParts::default().to_url(),
            max_connections: 20,
            min_connections: 2,
            connect_timeout_secs: 30,
            idle_timeout_secs: Some(600),
            max_lifetime_secs: Some(1800),
        }
    }
}

impl DbConfig {
    /// Read `DATABASE_URL`, falling back to `DB_HOST` and friends
    pub fn from_env() -> DbResult<Self> {
        Self::from_env_prefixed("DB")
    }

    /// Same as [`DbConfig::from_env`] with a custom variable prefix.
    ///
    /// With prefix `REPORTING` this reads `REPORTING_DATABASE_URL`,
    /// `REPORTING_HOST`, `REPORTING_MAX_CONNECTIONS` and so on. The default
    /// prefix `DB` keeps the plain `DATABASE_URL` name.
    pub fn from_env_prefixed(prefix: &str) -> DbResult<Self> {
        let var = |name: &str| prefixed_var(prefix, name);

        let url_var = if prefix == "DB" {
            "DATABASE_URL".to_string()
        } else {
            format!("{}_DATABASE_URL", prefix)
        };

        let url = match std::env::var(&url_var).ok() {
            Some(url) => url,
            None => {
                let host = var("HOST").ok_or_else(|| {
                    DbError::config(format!("{} and {}_HOST not set", url_var, prefix))
                })?;
                let defaults = ConnectionParts::default();
                ConnectionParts {
                    host,
                    port: parsed_var(prefix, "PORT")?.unwrap_or(defaults.port),
                    user: var("USER").unwrap_or(defaults.user),
                    password: var("PASSWORD").unwrap_or_default(),
                    database: var("NAME").unwrap_or(defaults.database),
                    ssl_mode: var("SSLMODE").unwrap_or(defaults.ssl_mode),
                }
                .to_url()
            },
        };

        let defaults = Self::default();
        Ok(Self {
            url,
            max_connections: parsed_var(prefix, "MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            min_connections: parsed_var(prefix, "MIN_CONNECTIONS")?
                .unwrap_or(defaults.min_connections),
            connect_timeout_secs: parsed_var(prefix, "CONNECT_TIMEOUT")?
                .unwrap_or(defaults.connect_timeout_secs),
            idle_timeout_secs: parsed_var(prefix, "IDLE_TIMEOUT")?,
            max_lifetime_secs: parsed_var(prefix, "MAX_LIFETIME")?,
        })
    }
}

fn prefixed_var(prefix: &str, name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", prefix, name)).ok()
}

fn parsed_var<T: std::str::FromStr>(prefix: &str, name: &str) -> DbResult<Option<T>> {
    match prefixed_var(prefix, name) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            DbError::config(format!("Invalid value for {}_{}: '{}'", prefix, name, raw))
        }),
        None => Ok(None),
    }
}

pub async fn create_pool(config: &DbConfig) -> DbResult<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(idle_timeout) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }

    if let Some(max_lifetime) = config.max_lifetime_secs {
        options = options.max_lifetime(Duration::from_secs(max_lifetime));
    }

    let pool = options.connect(&config.url).await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> DbResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(DbError::from)
}

/// Apply the bundled schema migrations
pub async fn migrate(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
