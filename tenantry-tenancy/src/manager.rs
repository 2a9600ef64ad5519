//! Per-request tenant context.

use crate::error::TenantError;
use crate::resolver::TenantResolver;
use crate::tenant::Tenant;
use std::sync::Arc;
use tenantry_core::HttpRequest;
use tracing::debug;

/// Holds the tenant for the request being processed.
///
/// One manager exists per request; it is created empty, filled by
/// resolution or explicit assignment and dropped with the request, so
/// concurrent requests never see each other's tenant. Scoped services
/// take a `&TenantManager` to decide which namespace an operation hits.
#[derive(Clone, Debug)]
pub struct TenantManager {
    resolver: Arc<TenantResolver>,
    current: Option<Arc<Tenant>>,
}

impl TenantManager {
    pub fn new(resolver: Arc<TenantResolver>) -> Self {
        Self {
            resolver,
            current: None,
        }
    }

    /// Resolve the request and store the result, which may be `None`
    pub fn resolve_from_request(&mut self, request: &HttpRequest) -> Option<Arc<Tenant>> {
        self.current = self.resolver.resolve(request);
        self.current.clone()
    }

    /// Set or clear the current tenant
    pub fn set_tenant(&mut self, tenant: Option<Arc<Tenant>>) {
        debug!(tenant_id = ?tenant.as_ref().map(|t| t.id.as_str()), "Setting current tenant");
        self.current = tenant;
    }

    /// Set the current tenant to a registered tenant by id.
    ///
    /// An unknown id leaves the current tenant unchanged.
    pub fn set_tenant_by_id(&mut self, id: &str) -> Result<Arc<Tenant>, TenantError> {
        let tenant = self
            .resolver
            .tenant(id)
            .ok_or_else(|| TenantError::NotFound(id.to_string()))?;
        self.set_tenant(Some(tenant.clone()));
        Ok(tenant)
    }

    pub fn tenant(&self) -> Option<&Arc<Tenant>> {
        self.current.as_ref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.current.as_deref().map(|t| t.id.as_str())
    }

    pub fn has_tenant(&self) -> bool {
        self.current.is_some()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn resolver(&self) -> &Arc<TenantResolver> {
        &self.resolver
    }
}
