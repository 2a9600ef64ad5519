//! Tenant-Aware Configuration
//!
//! Dotted-path lookups (`mail.host`) check the current tenant's override map
//! first and fall back to the shared base configuration.
//!
//! Two behaviors are kept on purpose and covered by tests:
//!
//! - a `null` override value counts as absent, so the base value shows through
//! - [`TenantConfig::all`] merges top-level keys only; a tenant's nested map
//!   replaces the base map under the same key instead of merging into it

use crate::error::TenantError;
use crate::manager::TenantManager;
use crate::tenant::Tenant;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared, tenant-agnostic configuration
pub trait ConfigSource: Send + Sync {
    /// Value at a dotted path
    fn get(&self, key: &str) -> Option<Value>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Top-level entries
    fn all(&self) -> Map<String, Value>;
}

/// In-memory [`ConfigSource`] over a JSON object
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: Map<String, Value>,
}

impl MapConfig {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Build from a JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> Result<Self, TenantError> {
        match value {
            Value::Object(values) => Ok(Self::new(values)),
            other => Err(TenantError::Invalid(format!(
                "configuration root must be an object, got {other}"
            ))),
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, TenantError> {
        let value: Value = toml::from_str(source)
            .map_err(|e| TenantError::Invalid(format!("TOML parse error: {e}")))?;
        Self::from_value(value)
    }

    /// Set a top-level value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}

impl ConfigSource for MapConfig {
    fn get(&self, key: &str) -> Option<Value> {
        lookup(&self.values, key).cloned()
    }

    fn all(&self) -> Map<String, Value> {
        self.values.clone()
    }
}

/// Walk a dotted path; `null` anywhere along it means absent
fn lookup<'a>(values: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut segments = key.split('.');
    let mut current = values.get(segments.next()?)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    (!current.is_null()).then_some(current)
}

/// Per-tenant overrides layered over a base [`ConfigSource`]
pub struct TenantConfig {
    base: Arc<dyn ConfigSource>,
    overrides: RwLock<HashMap<String, Map<String, Value>>>,
}

impl TenantConfig {
    pub fn new(base: Arc<dyn ConfigSource>) -> Self {
        Self {
            base,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn base(&self) -> &Arc<dyn ConfigSource> {
        &self.base
    }

    /// Register (or replace) a tenant's override map
    pub fn set_tenant_config(&self, tenant_id: impl Into<String>, config: Map<String, Value>) {
        self.overrides.write().insert(tenant_id.into(), config);
    }

    /// Use the tenant's own `config` as its override map
    pub fn load_tenant(&self, tenant: &Tenant) {
        self.set_tenant_config(tenant.id.clone(), tenant.config.clone());
    }

    pub fn has_tenant_config(&self, tenant_id: &str) -> bool {
        self.overrides.read().contains_key(tenant_id)
    }

    /// Value at a dotted path, tenant override first
    pub fn get(&self, ctx: &TenantManager, key: &str) -> Option<Value> {
        if let Some(tenant_id) = ctx.tenant_id() {
            let overrides = self.overrides.read();
            if let Some(value) = overrides.get(tenant_id).and_then(|map| lookup(map, key)) {
                return Some(value.clone());
            }
        }

        self.base.get(key)
    }

    pub fn get_or(&self, ctx: &TenantManager, key: &str, default: Value) -> Value {
        self.get(ctx, key).unwrap_or(default)
    }

    /// Typed lookup
    pub fn get_as<T: DeserializeOwned>(
        &self,
        ctx: &TenantManager,
        key: &str,
    ) -> Result<Option<T>, TenantError> {
        self.get(ctx, key)
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| TenantError::Invalid(format!("config key '{key}': {e}")))
            })
            .transpose()
    }

    pub fn has(&self, ctx: &TenantManager, key: &str) -> bool {
        let in_override = ctx.tenant_id().is_some_and(|tenant_id| {
            self.overrides
                .read()
                .get(tenant_id)
                .is_some_and(|map| lookup(map, key).is_some())
        });

        in_override || self.base.has(key)
    }

    /// Base entries with the current tenant's top-level entries laid over them
    pub fn all(&self, ctx: &TenantManager) -> Map<String, Value> {
        let mut merged = self.base.all();

        if let Some(tenant_id) = ctx.tenant_id()
            && let Some(overrides) = self.overrides.read().get(tenant_id)
        {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }

        merged
    }
}

impl std::fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tenants: Vec<String> = self.overrides.read().keys().cloned().collect();
        f.debug_struct("TenantConfig")
            .field("tenants", &tenants)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TenantResolver;
    use serde_json::json;

    fn ctx(tenant: Option<&str>) -> TenantManager {
        let mut manager = TenantManager::new(Arc::new(TenantResolver::new()));
        manager.set_tenant(tenant.map(|id| Arc::new(Tenant::new(id, id))));
        manager
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn config() -> TenantConfig {
        let base = MapConfig::from_value(json!({
            "app": {"name": "Base", "debug": false},
            "mail": {"host": "base.example", "port": 25},
            "feature": "on"
        }))
        .unwrap();

        let config = TenantConfig::new(Arc::new(base));
        config.set_tenant_config(
            "t",
            object(json!({
                "mail": {"host": "t.example"},
                "feature": null
            })),
        );
        config
    }

    #[test]
    fn test_override_wins() {
        let config = config();
        assert_eq!(config.get(&ctx(Some("t")), "mail.host"), Some(json!("t.example")));
        assert_eq!(config.get(&ctx(None), "mail.host"), Some(json!("base.example")));
        assert_eq!(config.get(&ctx(Some("other")), "mail.host"), Some(json!("base.example")));
    }

    #[test]
    fn test_missing_override_path_falls_back() {
        let config = config();
        assert_eq!(config.get(&ctx(Some("t")), "mail.port"), Some(json!(25)));
        assert_eq!(config.get(&ctx(Some("t")), "nope.deeper"), None);
        assert_eq!(
            config.get_or(&ctx(Some("t")), "nope", json!("dflt")),
            json!("dflt")
        );
    }

    #[test]
    fn test_null_override_is_treated_as_absent() {
        let config = config();
        let t = ctx(Some("t"));

        // An explicit null cannot unset a base value
        assert_eq!(config.get(&t, "feature"), Some(json!("on")));
        assert!(config.has(&t, "feature"));

        config.set_tenant_config("u", object(json!({"only_null": null})));
        assert!(!config.has(&ctx(Some("u")), "only_null"));
        assert_eq!(config.get(&ctx(Some("u")), "only_null"), None);
    }

    #[test]
    fn test_all_is_a_shallow_merge() {
        let config = config();
        let merged = config.all(&ctx(Some("t")));

        // Nested maps are replaced wholesale; `mail.port` is gone
        assert_eq!(merged.get("mail"), Some(&json!({"host": "t.example"})));
        assert_eq!(merged.get("app"), Some(&json!({"name": "Base", "debug": false})));
        // Top-level null still overwrites in the merge
        assert_eq!(merged.get("feature"), Some(&Value::Null));

        assert_eq!(config.all(&ctx(None)).get("mail"), Some(&json!({"host": "base.example", "port": 25})));
    }

    #[test]
    fn test_get_as() {
        let config = config();
        let port: Option<u16> = config.get_as(&ctx(Some("t")), "mail.port").unwrap();
        assert_eq!(port, Some(25));

        let bad: Result<Option<u16>, _> = config.get_as(&ctx(Some("t")), "mail.host");
        assert!(matches!(bad, Err(TenantError::Invalid(_))));
    }

    #[test]
    fn test_load_tenant_uses_tenant_config() {
        let config = config();
        let tenant = Tenant::new("acme", "Acme").with_config_value("app", json!({"name": "Acme"}));
        config.load_tenant(&tenant);

        assert!(config.has_tenant_config("acme"));
        assert_eq!(config.get(&ctx(Some("acme")), "app.name"), Some(json!("Acme")));
        assert_eq!(config.get(&ctx(Some("acme")), "app.debug"), Some(json!(false)));
    }

    #[test]
    fn test_map_config_from_toml() {
        let base = MapConfig::from_toml_str("[mail]\nhost = \"smtp.local\"\nport = 587\n").unwrap();
        assert_eq!(base.get("mail.port"), Some(json!(587)));
        assert!(base.has("mail.host"));
        assert!(!base.has("mail.user"));

        assert!(MapConfig::from_value(json!([1, 2])).is_err());
    }
}
