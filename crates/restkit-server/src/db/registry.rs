//! Named database pools
//!
//! Services that talk to more than one database register each under an
//! alias and look pools up by name. The alias `"default"` is used by the
//! demo server.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;

use super::{create_pool, DbConfig, DbError};

pub const DEFAULT_ALIAS: &str = "default";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown database alias '{0}'")]
    UnknownAlias(String),

    #[error("Database alias '{0}' is already registered")]
    DuplicateAlias(String),

    #[error("Failed to connect database '{alias}': {source}")]
    Connect {
        alias: String,
        #[source]
        source: DbError,
    },
}

/// Alias to pool map shared across handlers
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    pools: Arc<RwLock<BTreeMap<String, PgPool>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already created pool
    pub fn register(&self, alias: impl Into<String>, pool: PgPool) -> Result<(), RegistryError> {
        let alias = alias.into();
        let mut pools = self.pools.write();
        if pools.contains_key(&alias) {
            return Err(RegistryError::DuplicateAlias(alias));
        }
        tracing::debug!(alias = %alias, "Registered database pool");
        pools.insert(alias, pool);
        Ok(())
    }

    /// Create a pool from `config` and register it under `alias`
    pub async fn connect(&self, alias: &str, config: &DbConfig) -> Result<PgPool, RegistryError> {
        if self.contains(alias) {
            return Err(RegistryError::DuplicateAlias(alias.to_string()));
        }
        let pool = create_pool(config)
            .await
            .map_err(|source| RegistryError::Connect {
                alias: alias.to_string(),
                source,
            })?;
        self.register(alias, pool.clone())?;
        tracing::info!(alias, "Database connected");
        Ok(pool)
    }

    pub fn get(&self, alias: &str) -> Result<PgPool, RegistryError> {
        self.pools
            .read()
            .get(alias)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownAlias(alias.to_string()))
    }

    pub fn default_pool(&self) -> Result<PgPool, RegistryError> {
        self.get(DEFAULT_ALIAS)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.pools.read().contains_key(alias)
    }

    pub fn aliases(&self) -> Vec<String> {
        self.pools.read().keys().cloned().collect()
    }

    /// Close every pool, waiting for checked-out connections
    pub async fn close_all(&self) {
        let pools: Vec<(String, PgPool)> = self
            .pools
            .read()
            .iter()
            .map(|(alias, pool)| (alias.clone(), pool.clone()))
            .collect();
        for (alias, pool) in pools {
            pool.close().await;
            tracing::info!(alias = %alias, "Database pool closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgresql://postgres@localhost:5432/restkit")
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ConnectionRegistry::new();
        registry.register(DEFAULT_ALIAS, lazy_pool()).unwrap();
        registry.register("reporting", lazy_pool()).unwrap();

        assert!(registry.default_pool().is_ok());
        assert!(registry.get("reporting").is_ok());
        assert_eq!(registry.aliases(), vec!["default", "reporting"]);
    }

    #[tokio::test]
    async fn test_unknown_alias() {
        let registry = ConnectionRegistry::new();
        let err = registry.get("missing").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownAlias(ref a) if a == "missing"));
        assert_eq!(err.to_string(), "Unknown database alias 'missing'");
    }

    #[tokio::test]
    async fn test_duplicate_alias() {
        let registry = ConnectionRegistry::new();
        registry.register("a", lazy_pool()).unwrap();
        let err = registry.register("a", lazy_pool()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateAlias(_)));
    }

    #[tokio::test]
    async fn test_clones_share_pools() {
        let registry = ConnectionRegistry::new();
        let clone = registry.clone();
        registry.register("a", lazy_pool()).unwrap();
        assert!(clone.contains("a"));
    }
}
