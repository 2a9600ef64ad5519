//! Tenant-Aware Model Construction
//!
//! Logical model names map to typed factories. A tenant can swap the concrete
//! model used for a base name; lookups try the tenant's mapping, then the
//! default mapping, then the base name itself.
//!
//! # Examples
//!
//! ```
//! use serde_json::Value;
//! use std::sync::Arc;
//! use tenantry_tenancy::{Tenant, TenantManager, TenantModelResolver, TenantResolver};
//!
//! trait Invoice: Send + Sync {
//!     fn template(&self) -> &'static str;
//! }
//!
//! struct StandardInvoice;
//! impl Invoice for StandardInvoice {
//!     fn template(&self) -> &'static str { "standard" }
//! }
//!
//! struct AcmeInvoice;
//! impl Invoice for AcmeInvoice {
//!     fn template(&self) -> &'static str { "acme" }
//! }
//!
//! let models: TenantModelResolver<dyn Invoice> = TenantModelResolver::new();
//! models.register_model("Invoice", |_: &[Value]| Box::new(StandardInvoice) as Box<dyn Invoice>);
//! models.register_model("AcmeInvoice", |_: &[Value]| Box::new(AcmeInvoice) as Box<dyn Invoice>);
//! models.register_mapping("Invoice", "AcmeInvoice", Some("acme")).unwrap();
//!
//! let mut ctx = TenantManager::new(Arc::new(TenantResolver::new()));
//! ctx.set_tenant(Some(Arc::new(Tenant::new("acme", "Acme"))));
//!
//! assert_eq!(models.make(&ctx, "Invoice", &[]).unwrap().template(), "acme");
//! ```

use crate::error::TenantError;
use crate::manager::TenantManager;
use crate::tenant::DEFAULT_SCOPE;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds a model from positional arguments
pub type ModelFactory<M> = Arc<dyn Fn(&[Value]) -> Box<M> + Send + Sync>;

/// Registry of model factories plus per-tenant name mappings
pub struct TenantModelResolver<M: ?Sized> {
    factories: RwLock<HashMap<String, ModelFactory<M>>>,
    /// (tenant id or "default", base name) -> concrete name
    mappings: RwLock<HashMap<(String, String), String>>,
}

impl<M: ?Sized> TenantModelResolver<M> {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            mappings: RwLock::new(HashMap::new()),
        }
    }

    /// Register the factory for a model name, replacing any previous one
    pub fn register_model<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&[Value]) -> Box<M> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(model = %name, "Registered model factory");
        self.factories.write().insert(name, Arc::new(factory));
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Map `base` to `concrete` for one tenant, or for every tenant when
    /// `tenant_id` is `None`.
    ///
    /// `concrete` must already have a registered factory.
    pub fn register_mapping(
        &self,
        base: impl Into<String>,
        concrete: impl Into<String>,
        tenant_id: Option<&str>,
    ) -> Result<(), TenantError> {
        let concrete = concrete.into();
        if !self.has_model(&concrete) {
            return Err(TenantError::ModelNotFound(concrete));
        }

        let scope = tenant_id.unwrap_or(DEFAULT_SCOPE).to_string();
        self.mappings.write().insert((scope, base.into()), concrete);
        Ok(())
    }

    /// Concrete model name for `base` under the current tenant
    pub fn resolve(&self, ctx: &TenantManager, base: &str) -> String {
        let mappings = self.mappings.read();
        let lookup = |scope: &str| mappings.get(&(scope.to_string(), base.to_string()));

        ctx.tenant_id()
            .and_then(lookup)
            .or_else(|| lookup(DEFAULT_SCOPE))
            .cloned()
            .unwrap_or_else(|| base.to_string())
    }

    /// Build the model `base` resolves to under the current tenant
    pub fn make(
        &self,
        ctx: &TenantManager,
        base: &str,
        args: &[Value],
    ) -> Result<Box<M>, TenantError> {
        let name = self.resolve(ctx, base);
        let factory = self
            .factories
            .read()
            .get(&name)
            .cloned()
            .ok_or(TenantError::ModelNotFound(name))?;

        Ok(factory(args))
    }
}

impl<M: ?Sized> Default for TenantModelResolver<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized> std::fmt::Debug for TenantModelResolver<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let models: Vec<String> = self.factories.read().keys().cloned().collect();
        f.debug_struct("TenantModelResolver")
            .field("models", &models)
            .field("mappings", &*self.mappings.read())
            .finish()
    }
}
