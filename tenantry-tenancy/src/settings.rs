//! Tenancy settings
//!
//! Loaded from `TENANTRY_*` environment variables or a TOML document.
//!
//! | Field | Env var | Default |
//! |---|---|---|
//! | `tenant_header` | `TENANTRY_TENANT_HEADER` | `X-Tenant-ID` |
//! | `tenant_parameter` | `TENANTRY_TENANT_PARAMETER` | `tenant_id` |
//! | `require_tenant` | `TENANTRY_REQUIRE_TENANT` | `false` |

use crate::TenantError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

const ENV_PREFIX: &str = "TENANTRY_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancySettings {
    /// Header carrying an explicit tenant id
    pub tenant_header: String,

    /// Query/form/request parameter carrying an explicit tenant id
    pub tenant_parameter: String,

    /// Reject requests that resolve to no tenant instead of continuing
    pub require_tenant: bool,
}

impl Default for TenancySettings {
    fn default() -> Self {
        Self {
            tenant_header: "X-Tenant-ID".to_string(),
            tenant_parameter: "tenant_id".to_string(),
            require_tenant: false,
        }
    }
}

impl TenancySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant_header(mut self, header: impl Into<String>) -> Self {
        self.tenant_header = header.into();
        self
    }

    pub fn with_tenant_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.tenant_parameter = parameter.into();
        self
    }

    pub fn with_require_tenant(mut self, require: bool) -> Self {
        self.require_tenant = require;
        self
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, TenantError> {
        Self::from_vars(env::vars())
    }

    /// Load from `(name, value)` pairs; names without the `TENANTRY_` prefix are ignored
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, TenantError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.as_ref()
                    .strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), v.into()))
            })
            .collect();

        let mut settings = Self::default();

        if let Some(header) = vars.get("tenant_header") {
            settings.tenant_header = header.clone();
        }
        if let Some(parameter) = vars.get("tenant_parameter") {
            settings.tenant_parameter = parameter.clone();
        }
        if let Some(require) = vars.get("require_tenant") {
            settings.require_tenant = parse_bool(require).ok_or_else(|| {
                TenantError::Invalid(format!("TENANTRY_REQUIRE_TENANT: not a boolean: {require}"))
            })?;
        }

        Ok(settings)
    }

    /// Load from a TOML document; missing fields keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, TenantError> {
        toml::from_str(source).map_err(|e| TenantError::Invalid(format!("tenancy settings: {e}")))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = TenancySettings::default();
        assert_eq!(settings.tenant_header, "X-Tenant-ID");
        assert_eq!(settings.tenant_parameter, "tenant_id");
        assert!(!settings.require_tenant);
    }

    #[test]
    fn test_from_vars() {
        let settings = TenancySettings::from_vars([
            ("TENANTRY_TENANT_HEADER", "X-Org"),
            ("TENANTRY_REQUIRE_TENANT", "yes"),
            ("UNRELATED", "ignored"),
        ])
        .unwrap();

        assert_eq!(settings.tenant_header, "X-Org");
        assert_eq!(settings.tenant_parameter, "tenant_id");
        assert!(settings.require_tenant);
    }

    #[test]
    fn test_from_vars_rejects_bad_bool() {
        let result = TenancySettings::from_vars([("TENANTRY_REQUIRE_TENANT", "maybe")]);
        assert!(matches!(result, Err(TenantError::Invalid(_))));
    }

    #[test]
    fn test_from_toml_partial() {
        let settings = TenancySettings::from_toml_str("tenant_parameter = \"org\"\n").unwrap();
        assert_eq!(settings.tenant_parameter, "org");
        assert_eq!(settings.tenant_header, "X-Tenant-ID");
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(TenancySettings::from_toml_str("require_tenant = \"nope\"").is_err());
    }
}
