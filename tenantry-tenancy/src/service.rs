//! Startup wiring: load persisted tenants into the resolver.

use crate::error::TenantError;
use crate::manager::TenantManager;
use crate::repository::TenantRepository;
use crate::resolver::TenantResolver;
use std::sync::Arc;
use tracing::info;

/// Owns the resolver once it has been filled from the repository
#[derive(Debug, Clone)]
pub struct TenantService {
    repository: TenantRepository,
    resolver: Arc<TenantResolver>,
}

impl TenantService {
    /// Register every active tenant from `repository` into `resolver`
    pub async fn load(
        repository: TenantRepository,
        resolver: Arc<TenantResolver>,
    ) -> Result<Self, TenantError> {
        let service = Self {
            repository,
            resolver,
        };
        service.reload().await?;
        Ok(service)
    }

    /// Re-read active tenants, overwriting registered tenants with the same id.
    ///
    /// Tenants deactivated or deleted in storage stay registered.
    pub async fn reload(&self) -> Result<usize, TenantError> {
        let tenants = self.repository.find_all().await?;
        let count = tenants.len();

        for tenant in tenants {
            self.resolver.register_tenant(tenant)?;
        }

        info!(count, "Loaded tenants");
        Ok(count)
    }

    /// A fresh, empty manager for one request or work unit
    pub fn tenant_manager(&self) -> TenantManager {
        TenantManager::new(self.resolver.clone())
    }

    pub fn resolver(&self) -> &Arc<TenantResolver> {
        &self.resolver
    }

    pub fn repository(&self) -> &TenantRepository {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryTenantStore, TenantRecord};
    use tenantry_core::HttpRequest;

    fn store() -> Arc<InMemoryTenantStore> {
        let store = Arc::new(InMemoryTenantStore::new());
        store.insert(TenantRecord::new("acme", "Acme").with_subdomain("acme"));
        store.insert(TenantRecord::new("old", "Old").with_active(false));
        store
    }

    #[tokio::test]
    async fn test_load_registers_active_tenants() {
        let service = TenantService::load(
            TenantRepository::new(store()),
            Arc::new(TenantResolver::new()),
        )
        .await
        .unwrap();

        assert_eq!(service.resolver().len(), 1);
        assert!(service.resolver().tenant("old").is_none());

        let mut manager = service.tenant_manager();
        assert!(!manager.has_tenant());
        let req = HttpRequest::new("GET", "/").with_host("acme.saas.test");
        assert_eq!(manager.resolve_from_request(&req).unwrap().id, "acme");
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let store = store();
        let service = TenantService::load(
            TenantRepository::new(store.clone()),
            Arc::new(TenantResolver::new()),
        )
        .await
        .unwrap();

        store.insert(TenantRecord::new("acme", "Acme Renamed").with_subdomain("acme"));
        store.insert(TenantRecord::new("new", "New"));

        assert_eq!(service.reload().await.unwrap(), 2);
        assert_eq!(service.resolver().tenant("acme").unwrap().name, "Acme Renamed");
        assert!(service.resolver().tenant("new").is_some());
    }

    #[tokio::test]
    async fn test_load_fails_on_bad_config() {
        let store = store();
        store.insert(TenantRecord::new("bad", "Bad").with_config("nope"));

        let result = TenantService::load(
            TenantRepository::new(store),
            Arc::new(TenantResolver::new()),
        )
        .await;
        assert!(matches!(result, Err(TenantError::InvalidConfig { .. })));
    }
}
