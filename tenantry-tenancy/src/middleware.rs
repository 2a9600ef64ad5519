//! Tenant Middleware
//!
//! Resolves the tenant at the start of each request and hands the
//! request-scoped [`TenantManager`] to downstream handlers through the
//! request's extensions.

use crate::manager::TenantManager;
use crate::resolver::TenantResolver;
use async_trait::async_trait;
use std::sync::Arc;
use tenantry_core::{Error, HttpRequest, HttpResponse, Middleware, Next};
use tracing::{debug, warn};

/// Tenant middleware
///
/// - resolved and active: the manager is attached and the chain continues
/// - resolved but inactive: rejected with [`Error::Forbidden`]
/// - unresolved: continues without a tenant, or is rejected with
///   [`Error::Unauthorized`] when a tenant is required
pub struct TenantMiddleware {
    resolver: Arc<TenantResolver>,
    require_tenant: bool,
}

impl TenantMiddleware {
    /// Create new tenant middleware
    ///
    /// `require_tenant` starts from the resolver's settings.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let middleware = TenantMiddleware::new(resolver.clone());
    /// chain.use_middleware(middleware);
    /// ```
    pub fn new(resolver: Arc<TenantResolver>) -> Self {
        let require_tenant = resolver.settings().require_tenant;
        Self {
            resolver,
            require_tenant,
        }
    }

    /// Reject requests that resolve to no tenant
    pub fn with_require_tenant(mut self, require: bool) -> Self {
        self.require_tenant = require;
        self
    }
}

#[async_trait]
impl Middleware for TenantMiddleware {
    async fn handle(&self, mut request: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let mut manager = TenantManager::new(self.resolver.clone());

        match manager.resolve_from_request(&request) {
            Some(tenant) if !tenant.active => {
                warn!(tenant_id = %tenant.id, path = %request.path, "Rejected request for inactive tenant");
                return Err(Error::Forbidden("Tenant is not active".to_string()));
            }
            Some(_) => {}
            None if self.require_tenant => {
                debug!(path = %request.path, "Rejected request without tenant");
                return Err(Error::Unauthorized("Tenant could not be resolved".to_string()));
            }
            None => {}
        }

        request.extensions.insert(manager);
        next(request).await
    }
}

/// The request's tenant context, as attached by [`TenantMiddleware`]
pub fn tenant_manager(request: &HttpRequest) -> Option<&TenantManager> {
    request.extensions.get::<TenantManager>()
}

/// Helper to extract the resolved tenant id from a request
pub fn get_tenant_id(request: &HttpRequest) -> Option<String> {
    tenant_manager(request)
        .and_then(TenantManager::tenant_id)
        .map(str::to_string)
}
