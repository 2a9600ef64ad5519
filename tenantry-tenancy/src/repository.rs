//! Tenant persistence.
//!
//! A [`TenantStore`] returns raw rows; [`TenantRepository`] turns them into
//! [`Tenant`] values. Stores only ever return active tenants.

use crate::error::TenantError;
use crate::tenant::Tenant;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A tenant row as stored, with `config` kept as JSON text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub domain: Option<String>,
    pub subdomain: Option<String>,
    pub config: Option<String>,
    pub active: bool,
}

impl TenantRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain: None,
            subdomain: None,
            config: None,
            active: true,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Convert into a [`Tenant`], parsing the JSON config.
    ///
    /// Missing or blank config is an empty map.
    pub fn into_tenant(self) -> Result<Tenant, TenantError> {
        let config = match self.config.as_deref().map(str::trim) {
            None | Some("") => Map::new(),
            Some(text) => parse_config(&self.id, text)?,
        };

        let mut tenant = Tenant::new(self.id, self.name)
            .with_config(config)
            .with_active(self.active);
        tenant.domain = self.domain;
        tenant.subdomain = self.subdomain;
        Ok(tenant)
    }
}

impl TryFrom<&Tenant> for TenantRecord {
    type Error = TenantError;

    fn try_from(tenant: &Tenant) -> Result<Self, Self::Error> {
        let config = serde_json::to_string(&tenant.config).map_err(|e| TenantError::InvalidConfig {
            tenant: tenant.id.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            id: tenant.id.clone(),
            name: tenant.name.clone(),
            domain: tenant.domain.clone(),
            subdomain: tenant.subdomain.clone(),
            config: Some(config),
            active: tenant.active,
        })
    }
}

fn parse_config(tenant_id: &str, text: &str) -> Result<Map<String, Value>, TenantError> {
    let invalid = |reason: String| TenantError::InvalidConfig {
        tenant: tenant_id.to_string(),
        reason,
    };

    match serde_json::from_str::<Value>(text).map_err(|e| invalid(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(invalid(format!("expected a JSON object, got {other}"))),
    }
}

/// Storage backend for tenant rows
///
/// Every lookup returns active rows only.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<TenantRecord>, TenantError>;

    async fn find_by_domain(&self, domain: &str) -> Result<Option<TenantRecord>, TenantError>;

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<TenantRecord>, TenantError>;

    async fn find_all_active(&self) -> Result<Vec<TenantRecord>, TenantError>;
}

/// [`TenantStore`] over an in-memory table, rows kept in insertion order
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    rows: RwLock<Vec<TenantRecord>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row, replacing the row with the same id in place
    pub fn insert(&self, record: TenantRecord) {
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|row| row.id == record.id) {
            Some(row) => *row = record,
            None => rows.push(record),
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        rows.len() != before
    }

    fn find_active(&self, predicate: impl Fn(&TenantRecord) -> bool) -> Option<TenantRecord> {
        self.rows
            .read()
            .iter()
            .find(|row| row.active && predicate(*row))
            .cloned()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<TenantRecord>, TenantError> {
        Ok(self.find_active(|row| row.id == id))
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<TenantRecord>, TenantError> {
        Ok(self.find_active(|row| row.domain.as_deref() == Some(domain)))
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<TenantRecord>, TenantError> {
        Ok(self.find_active(|row| row.subdomain.as_deref() == Some(subdomain)))
    }

    async fn find_all_active(&self) -> Result<Vec<TenantRecord>, TenantError> {
        Ok(self.rows.read().iter().filter(|row| row.active).cloned().collect())
    }
}

/// Loads [`Tenant`] values from a [`TenantStore`]
#[derive(Clone)]
pub struct TenantRepository {
    store: Arc<dyn TenantStore>,
}

impl TenantRepository {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>, TenantError> {
        self.store.find_by_id(id).await?.map(TenantRecord::into_tenant).transpose()
    }

    pub async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, TenantError> {
        self.store
            .find_by_domain(domain)
            .await?
            .map(TenantRecord::into_tenant)
            .transpose()
    }

    pub async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, TenantError> {
        self.store
            .find_by_subdomain(subdomain)
            .await?
            .map(TenantRecord::into_tenant)
            .transpose()
    }

    /// All active tenants; one bad config fails the whole load
    pub async fn find_all(&self) -> Result<Vec<Tenant>, TenantError> {
        self.store
            .find_all_active()
            .await?
            .into_iter()
            .map(TenantRecord::into_tenant)
            .collect()
    }
}

impl std::fmt::Debug for TenantRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRepository").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repository() -> (Arc<InMemoryTenantStore>, TenantRepository) {
        let store = Arc::new(InMemoryTenantStore::new());
        store.insert(
            TenantRecord::new("acme", "Acme")
                .with_domain("portal.acme.com")
                .with_subdomain("acme")
                .with_config(r#"{"theme": "dark", "mail": {"host": "acme.mail"}}"#),
        );
        store.insert(TenantRecord::new("globex", "Globex").with_subdomain("globex"));
        store.insert(
            TenantRecord::new("initech", "Initech")
                .with_domain("initech.com")
                .with_active(false),
        );
        (store.clone(), TenantRepository::new(store))
    }

    #[tokio::test]
    async fn test_find_by_id_parses_config() {
        let (_, repository) = repository();
        let tenant = repository.find_by_id("acme").await.unwrap().unwrap();

        assert_eq!(tenant.domain.as_deref(), Some("portal.acme.com"));
        assert_eq!(tenant.config.get("theme"), Some(&json!("dark")));
        assert_eq!(tenant.config.get("mail"), Some(&json!({"host": "acme.mail"})));
        assert!(tenant.active);
    }

    #[tokio::test]
    async fn test_missing_config_is_empty() {
        let (store, repository) = repository();
        store.insert(TenantRecord::new("blank", "Blank").with_config("  "));

        assert!(repository.find_by_id("globex").await.unwrap().unwrap().config.is_empty());
        assert!(repository.find_by_id("blank").await.unwrap().unwrap().config.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_rows_are_invisible() {
        let (_, repository) = repository();

        assert!(repository.find_by_id("initech").await.unwrap().is_none());
        assert!(repository.find_by_domain("initech.com").await.unwrap().is_none());

        let ids: Vec<String> = repository
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["acme", "globex"]);
    }

    #[tokio::test]
    async fn test_lookup_by_domain_and_subdomain() {
        let (_, repository) = repository();
        assert_eq!(
            repository.find_by_domain("portal.acme.com").await.unwrap().unwrap().id,
            "acme"
        );
        assert_eq!(
            repository.find_by_subdomain("globex").await.unwrap().unwrap().id,
            "globex"
        );
        assert!(repository.find_by_subdomain("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_config_is_an_error() {
        let (store, repository) = repository();
        store.insert(TenantRecord::new("broken", "Broken").with_config("{not json"));
        store.insert(TenantRecord::new("listy", "Listy").with_config("[1, 2]"));

        assert!(matches!(
            repository.find_by_id("broken").await,
            Err(TenantError::InvalidConfig { ref tenant, .. }) if tenant == "broken"
        ));
        assert!(matches!(
            repository.find_by_id("listy").await,
            Err(TenantError::InvalidConfig { .. })
        ));
        assert!(repository.find_all().await.is_err());
    }

    #[test]
    fn test_record_from_tenant() {
        let tenant = Tenant::new("t", "T")
            .with_subdomain("t")
            .with_config_value("a", json!(1));
        let record = TenantRecord::try_from(&tenant).unwrap();

        assert_eq!(record.config.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(record.into_tenant().unwrap(), tenant);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let store = InMemoryTenantStore::new();
        store.insert(TenantRecord::new("a", "A"));
        store.insert(TenantRecord::new("b", "B"));
        store.insert(TenantRecord::new("a", "A2"));

        let rows = tokio_test::block_on(store.find_all_active()).unwrap();
        assert_eq!(rows[0].name, "A2");
        assert_eq!(rows.len(), 2);
        assert!(store.remove("b"));
        assert!(!store.remove("b"));
    }
}
