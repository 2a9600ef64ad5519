//! Database Per Tenant
//!
//! Tenants with a registered [`DatabaseConfig`] get their own connection,
//! opened on first use and cached for the life of the resolver. Everything
//! else (no current tenant, or a tenant without a config) uses the shared
//! default connection.
//!
//! # Usage
//!
//! ```rust,ignore
//! let databases = TenantDatabaseResolver::new(MyConnector, default_conn);
//! databases.register_tenant_database(
//!     "acme",
//!     DatabaseConfig::new("acme_db").with_host("db-1.internal"),
//! );
//!
//! let conn = databases.get_connection(&ctx).await?;
//! ```

use crate::manager::TenantManager;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Connection parameters for a tenant database
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "mysql".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            database: String::new(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl DatabaseConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// `{driver}:host={host};port={port};dbname={database}`
    pub fn dsn(&self) -> String {
        format!(
            "{}:host={};port={};dbname={}",
            self.driver, self.host, self.port, self.database
        )
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens connections from a [`DatabaseConfig`]
///
/// Implement this with your driver of choice (sqlx, diesel, ...).
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// The connection or pool handle
    type Connection: Send + Sync + 'static;

    /// The driver's error, returned to callers unchanged
    type Error: std::error::Error + Send + Sync + 'static;

    async fn connect(&self, config: &DatabaseConfig) -> Result<Self::Connection, Self::Error>;
}

/// Resolves the database connection for the current tenant
pub struct TenantDatabaseResolver<F: ConnectionFactory> {
    factory: F,
    default: Arc<F::Connection>,
    configs: DashMap<String, DatabaseConfig>,
    /// One cell per tenant so concurrent first use opens a single connection
    connections: DashMap<String, Arc<OnceCell<Arc<F::Connection>>>>,
}

impl<F: ConnectionFactory> TenantDatabaseResolver<F> {
    pub fn new(factory: F, default: F::Connection) -> Self {
        Self {
            factory,
            default: Arc::new(default),
            configs: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    /// Store connection parameters; no connection is opened yet.
    ///
    /// An already-open connection for the tenant stays in use until
    /// [`invalidate_tenant`](Self::invalidate_tenant) is called.
    pub fn register_tenant_database(&self, tenant_id: impl Into<String>, config: DatabaseConfig) {
        self.configs.insert(tenant_id.into(), config);
    }

    pub fn has_tenant_database(&self, tenant_id: &str) -> bool {
        self.configs.contains_key(tenant_id)
    }

    pub fn default_connection(&self) -> Arc<F::Connection> {
        self.default.clone()
    }

    /// Connection for the current tenant.
    ///
    /// A failed connect is returned as the driver's error and not cached; the
    /// next call tries again.
    pub async fn get_connection(&self, ctx: &TenantManager) -> Result<Arc<F::Connection>, F::Error> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(self.default.clone());
        };

        if let Some(connection) = self.cached(tenant_id) {
            return Ok(connection);
        }

        let Some(config) = self.configs.get(tenant_id).map(|c| c.value().clone()) else {
            return Ok(self.default.clone());
        };

        let cell = self
            .connections
            .entry(tenant_id.to_string())
            .or_default()
            .clone();

        let connection = cell
            .get_or_try_init(|| async {
                info!(tenant_id, dsn = %config.dsn(), "Opening tenant database connection");
                self.factory
                    .connect(&config)
                    .await
                    .map(Arc::new)
                    .inspect_err(|e| {
                        warn!(tenant_id, error = %e, "Tenant database connection failed")
                    })
            })
            .await?;

        Ok(connection.clone())
    }

    /// Drop the tenant's cached connection; its config stays registered
    pub fn invalidate_tenant(&self, tenant_id: &str) {
        self.connections.remove(tenant_id);
    }

    fn cached(&self, tenant_id: &str) -> Option<Arc<F::Connection>> {
        self.connections
            .get(tenant_id)
            .and_then(|cell| cell.value().get().cloned())
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for TenantDatabaseResolver<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tenants: Vec<String> = self.configs.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("TenantDatabaseResolver")
            .field("tenants", &tenants)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TenantResolver;
    use crate::tenant::Tenant;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct MockConnection {
        dsn: String,
        serial: usize,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused: {0}")]
    struct MockError(String);

    #[derive(Default)]
    struct MockConnector {
        opened: AtomicUsize,
        fail_next: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionFactory for Arc<MockConnector> {
        type Connection = MockConnection;
        type Error = MockError;

        async fn connect(&self, config: &DatabaseConfig) -> Result<MockConnection, MockError> {
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(MockError(config.host.clone()));
            }
            tokio::task::yield_now().await;
            let serial = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(MockConnection {
                dsn: config.dsn(),
                serial,
            })
        }
    }

    fn ctx(tenant: Option<&str>) -> TenantManager {
        let mut manager = TenantManager::new(Arc::new(TenantResolver::new()));
        manager.set_tenant(tenant.map(|id| Arc::new(Tenant::new(id, id))));
        manager
    }

    fn resolver() -> (Arc<MockConnector>, TenantDatabaseResolver<Arc<MockConnector>>) {
        let connector = Arc::new(MockConnector::default());
        let default = MockConnection {
            dsn: "default".to_string(),
            serial: 0,
        };
        let resolver = TenantDatabaseResolver::new(connector.clone(), default);
        resolver.register_tenant_database("acme", DatabaseConfig::new("acme_db"));
        (connector, resolver)
    }

    #[test]
    fn test_config_defaults_and_dsn() {
        let config: DatabaseConfig =
            serde_json::from_value(serde_json::json!({"database": "app", "password": "s3cret"})).unwrap();

        assert_eq!(config.dsn(), "mysql:host=localhost;port=3306;dbname=app");
        assert!(config.username.is_empty());
        assert!(!format!("{config:?}").contains("s3cret"));

        let pg = DatabaseConfig::new("t").with_driver("pgsql").with_host("db").with_port(5432);
        assert_eq!(pg.dsn(), "pgsql:host=db;port=5432;dbname=t");
    }

    #[tokio::test]
    async fn test_default_without_tenant_or_config() {
        let (connector, resolver) = resolver();

        let conn = resolver.get_connection(&ctx(None)).await.unwrap();
        assert!(Arc::ptr_eq(&conn, &resolver.default_connection()));

        let conn = resolver.get_connection(&ctx(Some("unknown"))).await.unwrap();
        assert!(Arc::ptr_eq(&conn, &resolver.default_connection()));

        assert_eq!(connector.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_is_lazy_and_cached() {
        let (connector, resolver) = resolver();
        assert!(resolver.has_tenant_database("acme"));
        assert_eq!(connector.opened.load(Ordering::SeqCst), 0);

        let acme = ctx(Some("acme"));
        let first = resolver.get_connection(&acme).await.unwrap();
        let second = resolver.get_connection(&acme).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dsn, "mysql:host=localhost;port=3306;dbname=acme_db");
        assert_eq!(connector.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_propagates_and_is_not_cached() {
        let (connector, resolver) = resolver();
        connector.fail_next.store(1, Ordering::SeqCst);
        let acme = ctx(Some("acme"));

        let err = resolver.get_connection(&acme).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused: localhost");

        let conn = resolver.get_connection(&acme).await.unwrap();
        assert_eq!(conn.serial, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_opens_once() {
        let (connector, resolver) = resolver();
        let resolver = Arc::new(resolver);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver.get_connection(&ctx(Some("acme"))).await.unwrap()
            }));
        }

        let mut connections = Vec::new();
        for handle in handles {
            connections.push(handle.await.unwrap());
        }

        assert_eq!(connector.opened.load(Ordering::SeqCst), 1);
        assert!(connections.iter().all(|c| Arc::ptr_eq(c, &connections[0])));
    }

    #[tokio::test]
    async fn test_invalidate_reopens() {
        let (connector, resolver) = resolver();
        let acme = ctx(Some("acme"));

        let first = resolver.get_connection(&acme).await.unwrap();
        resolver.invalidate_tenant("acme");
        let second = resolver.get_connection(&acme).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.opened.load(Ordering::SeqCst), 2);
    }
}
