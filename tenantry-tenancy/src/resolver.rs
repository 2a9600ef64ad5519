//! Tenant Resolution
//!
//! Maps an inbound request to a registered tenant.
//!
//! Strategies run in a fixed order and the first hit wins:
//!
//! 1. **Domain** - `Host` header equals a tenant's `domain` (scan, registry order)
//! 2. **Subdomain** - first label of a host with at least three labels equals a
//!    tenant's `subdomain` (scan, registry order)
//! 3. **Parameter** - `tenant_id` from the query string, then form data, then the
//!    generic parameter bag, used as a direct id lookup
//! 4. **Header** - `X-Tenant-ID` used as a direct id lookup
//! 5. **Custom** - registered [`ResolverStrategy`] values, in registration order
//!
//! A request matching nothing resolves to `None`; that is not an error.

use crate::error::TenantError;
use crate::settings::TenancySettings;
use crate::tenant::Tenant;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tenantry_core::HttpRequest;
use tracing::debug;

/// A custom way of deriving a tenant from a request.
///
/// Closures `Fn(&HttpRequest) -> Option<Arc<Tenant>>` implement this trait.
pub trait ResolverStrategy: Send + Sync {
    fn resolve(&self, request: &HttpRequest) -> Option<Arc<Tenant>>;
}

impl<F> ResolverStrategy for F
where
    F: Fn(&HttpRequest) -> Option<Arc<Tenant>> + Send + Sync,
{
    fn resolve(&self, request: &HttpRequest) -> Option<Arc<Tenant>> {
        self(request)
    }
}

/// Known tenants by id, iterated in first-registration order
#[derive(Default)]
struct Registry {
    order: Vec<String>,
    tenants: HashMap<String, Arc<Tenant>>,
}

impl Registry {
    fn iter(&self) -> impl Iterator<Item = &Arc<Tenant>> {
        self.order.iter().filter_map(|id| self.tenants.get(id))
    }
}

/// Tenant registry plus the resolution strategy chain
pub struct TenantResolver {
    settings: TenancySettings,
    registry: RwLock<Registry>,
    strategies: RwLock<Vec<(String, Arc<dyn ResolverStrategy>)>>,
}

impl TenantResolver {
    pub fn new() -> Self {
        Self::with_settings(TenancySettings::default())
    }

    /// Create a resolver reading the header/parameter names from `settings`
    pub fn with_settings(settings: TenancySettings) -> Self {
        Self {
            settings,
            registry: RwLock::new(Registry::default()),
            strategies: RwLock::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &TenancySettings {
        &self.settings
    }

    /// Register a tenant, replacing any tenant with the same id.
    ///
    /// A replaced tenant keeps its position in scan order.
    pub fn register_tenant(&self, tenant: Tenant) -> Result<Arc<Tenant>, TenantError> {
        if tenant.id.is_empty() {
            return Err(TenantError::Invalid("tenant id must not be empty".to_string()));
        }

        let tenant = Arc::new(tenant);
        let mut registry = self.registry.write();

        match registry.tenants.insert(tenant.id.clone(), tenant.clone()) {
            Some(_) => debug!(tenant_id = %tenant.id, "Replaced registered tenant"),
            None => {
                registry.order.push(tenant.id.clone());
                debug!(tenant_id = %tenant.id, "Registered tenant");
            }
        }

        Ok(tenant)
    }

    /// Register a named custom strategy.
    ///
    /// A known name is replaced in place; a new name runs after all others.
    pub fn register_resolver<S>(&self, name: impl Into<String>, strategy: S)
    where
        S: ResolverStrategy + 'static,
    {
        let name = name.into();
        let strategy: Arc<dyn ResolverStrategy> = Arc::new(strategy);
        let mut strategies = self.strategies.write();

        match strategies.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = strategy,
            None => strategies.push((name.clone(), strategy)),
        }

        debug!(strategy = %name, "Registered custom tenant resolver");
    }

    /// Resolve the tenant for a request
    pub fn resolve(&self, request: &HttpRequest) -> Option<Arc<Tenant>> {
        let resolved = self
            .resolve_by_domain(request)
            .map(|t| (t, "domain"))
            .or_else(|| self.resolve_by_subdomain(request).map(|t| (t, "subdomain")))
            .or_else(|| self.resolve_by_parameter(request).map(|t| (t, "parameter")))
            .or_else(|| self.resolve_by_header(request).map(|t| (t, "header")))
            .or_else(|| self.resolve_by_custom(request));

        match resolved {
            Some((tenant, strategy)) => {
                debug!(tenant_id = %tenant.id, strategy, "Resolved tenant");
                Some(tenant)
            }
            None => {
                debug!(path = %request.path, host = ?request.host(), "No tenant matched request");
                None
            }
        }
    }

    /// Look up a registered tenant by id
    pub fn tenant(&self, id: &str) -> Option<Arc<Tenant>> {
        self.registry.read().tenants.get(id).cloned()
    }

    /// Snapshot of all registered tenants in registry order
    pub fn tenants(&self) -> Vec<Arc<Tenant>> {
        self.registry.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.registry.read().tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().tenants.is_empty()
    }

    fn resolve_by_domain(&self, request: &HttpRequest) -> Option<Arc<Tenant>> {
        let host = request.host().filter(|h| !h.is_empty())?;

        self.registry
            .read()
            .iter()
            .find(|t| t.domain.as_deref() == Some(host))
            .cloned()
    }

    fn resolve_by_subdomain(&self, request: &HttpRequest) -> Option<Arc<Tenant>> {
        let host = request.host()?;
        let labels: Vec<&str> = host.split('.').collect();

        if labels.len() < 3 || labels[0].is_empty() {
            return None;
        }

        let subdomain = labels[0];
        self.registry
            .read()
            .iter()
            .find(|t| t.subdomain.as_deref() == Some(subdomain))
            .cloned()
    }

    fn resolve_by_parameter(&self, request: &HttpRequest) -> Option<Arc<Tenant>> {
        let name = self.settings.tenant_parameter.as_str();
        let tenant_id = request
            .query(name)
            .or_else(|| request.form(name))
            .or_else(|| request.param(name))?;

        self.tenant(tenant_id)
    }

    fn resolve_by_header(&self, request: &HttpRequest) -> Option<Arc<Tenant>> {
        let tenant_id = request.header(&self.settings.tenant_header)?;
        self.tenant(tenant_id)
    }

    fn resolve_by_custom(&self, request: &HttpRequest) -> Option<(Arc<Tenant>, &'static str)> {
        // Snapshot so strategies run without holding the lock
        let strategies: Vec<Arc<dyn ResolverStrategy>> =
            self.strategies.read().iter().map(|(_, s)| s.clone()).collect();

        strategies
            .iter()
            .find_map(|strategy| strategy.resolve(request))
            .map(|t| (t, "custom"))
    }
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let strategies: Vec<String> = self
            .strategies
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();

        f.debug_struct("TenantResolver")
            .field("settings", &self.settings)
            .field("tenants", &self.registry.read().order)
            .field("strategies", &strategies)
            .finish()
    }
}
