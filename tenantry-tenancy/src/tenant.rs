//! Tenant Identity
//!
//! The immutable record describing one tenant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fallback scope used for namespacing when no tenant is current
pub const DEFAULT_SCOPE: &str = "default";

/// Tenant information
///
/// Registered tenants are shared as `Arc<Tenant>` and never mutated; an
/// update is a re-registration of a new value under the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    /// Unique tenant identifier, the key for all namespacing
    pub id: String,

    /// Display name
    pub name: String,

    /// Full host the tenant is served on (e.g. `portal.acme.com`)
    pub domain: Option<String>,

    /// First host label the tenant is served on (e.g. `acme` in `acme.app.example.com`)
    pub subdomain: Option<String>,

    /// Tenant-specific configuration overrides
    #[serde(default)]
    pub config: Map<String, Value>,

    /// Whether tenant is active
    pub active: bool,
}

impl Tenant {
    /// Create a new active tenant
    ///
    /// # Examples
    ///
    /// ```
    /// use tenantry_tenancy::Tenant;
    ///
    /// let tenant = Tenant::new("tenant-123", "Acme Corp");
    /// assert!(tenant.active);
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain: None,
            subdomain: None,
            config: Map::new(),
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

    /// Replace the configuration overrides
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// Set a single top-level configuration value
    pub fn with_config_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Cache key qualified with this tenant's id
    ///
    /// # Examples
    ///
    /// ```
    /// use tenantry_tenancy::Tenant;
    ///
    /// let tenant = Tenant::new("tenant-123", "acme");
    /// assert_eq!(tenant.cache_key("users:1"), "tenant:tenant-123:users:1");
    /// ```
    pub fn cache_key(&self, key: &str) -> String {
        scoped_key(Some(&self.id), key)
    }
}

/// `tenant:{id}:{key}`, with [`DEFAULT_SCOPE`] standing in for a missing id
pub(crate) fn scoped_key(tenant_id: Option<&str>, key: &str) -> String {
    format!("{}{}", scope_prefix(tenant_id), key)
}

/// `tenant:{id}:`
pub(crate) fn scope_prefix(tenant_id: Option<&str>) -> String {
    format!("tenant:{}:", tenant_id.unwrap_or(DEFAULT_SCOPE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_builder() {
        let tenant = Tenant::new("tenant-1", "Acme")
            .with_domain("portal.acme.com")
            .with_subdomain("acme")
            .with_config_value("theme", json!("dark"))
            .with_active(false);

        assert_eq!(tenant.domain.as_deref(), Some("portal.acme.com"));
        assert_eq!(tenant.subdomain.as_deref(), Some("acme"));
        assert_eq!(tenant.config.get("theme"), Some(&json!("dark")));
        assert!(!tenant.active);
    }

    #[test]
    fn test_scoped_key_fallback() {
        assert_eq!(scoped_key(None, "k"), "tenant:default:k");
        assert_eq!(scoped_key(Some("acme"), "k"), "tenant:acme:k");
        assert_eq!(scope_prefix(Some("acme")), "tenant:acme:");
    }

    #[test]
    fn test_deserialize_without_config() {
        let tenant: Tenant = serde_json::from_value(json!({
            "id": "t1",
            "name": "One",
            "domain": null,
            "subdomain": "one",
            "active": true
        }))
        .unwrap();

        assert!(tenant.config.is_empty());
        assert_eq!(tenant.subdomain.as_deref(), Some("one"));
    }
}
