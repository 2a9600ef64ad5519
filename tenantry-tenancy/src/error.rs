//! Tenancy errors.

/// Errors raised by tenant registration, loading and model construction.
///
/// A request that matches no tenant is not an error; resolution returns `None`.
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Invalid tenant: {0}")]
    Invalid(String),

    #[error("Model type '{0}' not found")]
    ModelNotFound(String),

    #[error("Invalid configuration for tenant {tenant}: {reason}")]
    InvalidConfig { tenant: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}
