//! Tenant-Aware Caching
//!
//! Every key is rewritten to `tenant:{id}:{key}` (`tenant:default:{key}` when
//! no tenant is current) before it reaches the backing [`CacheStore`].

use crate::manager::TenantManager;
use crate::tenant::{Tenant, scope_prefix, scoped_key};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Backing key-value store.
///
/// Implement this for Redis, Memcached, etc. [`InMemoryCacheStore`] is the
/// process-local default.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a live value
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store a value; `None` never expires
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Whether a live value exists
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key
    async fn clear(&self) -> Result<(), CacheError>;

    /// Remove every key starting with `prefix`, returning how many were removed
    async fn clear_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache error: {0}")]
    Error(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Unbounded in-process store with lazy expiry.
///
/// Expired entries are dropped when `get` or `exists` touches them; nothing
/// sweeps in the background.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live(&self, key: &str) -> Option<Value> {
        let now = Instant::now();

        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        // Shard guard is released above; remove only if still expired
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live(key).is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()))
    }
}

/// Tenant-aware cache wrapper
///
/// Shared across requests; each call reads the tenant from the caller's
/// [`TenantManager`].
#[derive(Debug, Default)]
pub struct TenantCache<S: CacheStore = InMemoryCacheStore> {
    store: S,
}

impl<S: CacheStore> TenantCache<S> {
    /// Create new tenant cache with injected store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The store key `key` maps to under the current tenant
    pub fn key(&self, ctx: &TenantManager, key: &str) -> String {
        scoped_key(ctx.tenant_id(), key)
    }

    pub async fn get(&self, ctx: &TenantManager, key: &str) -> Result<Option<Value>, CacheError> {
        self.store.get(&self.key(ctx, key)).await
    }

    /// Get a value, or `default` when missing or expired
    pub async fn get_or(
        &self,
        ctx: &TenantManager,
        key: &str,
        default: Value,
    ) -> Result<Value, CacheError> {
        Ok(self.get(ctx, key).await?.unwrap_or(default))
    }

    /// Store a value; a `ttl` of `None` never expires
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// cache.set(&ctx, "users:1", json!({"name": "Alice"}), Some(Duration::from_secs(3600))).await?;
    /// ```
    pub async fn set(
        &self,
        ctx: &TenantManager,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.store.set(&self.key(ctx, key), value, ttl).await
    }

    pub async fn has(&self, ctx: &TenantManager, key: &str) -> Result<bool, CacheError> {
        self.store.exists(&self.key(ctx, key)).await
    }

    pub async fn delete(&self, ctx: &TenantManager, key: &str) -> Result<(), CacheError> {
        self.store.delete(&self.key(ctx, key)).await
    }

    /// Remove the current tenant's keys only
    pub async fn clear(&self, ctx: &TenantManager) -> Result<usize, CacheError> {
        let prefix = scope_prefix(ctx.tenant_id());
        let removed = self.store.clear_prefix(&prefix).await?;
        debug!(prefix = %prefix, removed, "Cleared tenant cache scope");
        Ok(removed)
    }

    /// Remove every key for every tenant.
    ///
    /// Not tenant-scoped. Restrict who can reach this.
    pub async fn clear_all(&self) -> Result<(), CacheError> {
        warn!("Clearing cache for all tenants");
        self.store.clear().await
    }

    /// Get value with JSON deserialization
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &TenantManager,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        match self.get(ctx, key).await? {
            Some(value) => {
                let value = serde_json::from_value(value)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set value with JSON serialization
    pub async fn set_json<T: Serialize>(
        &self,
        ctx: &TenantManager,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let value =
            serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set(ctx, key, value, ttl).await
    }
}

/// Cache key builder
///
/// Helps build complex cache keys with tenant prefix.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    parts: Vec<String>,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, part: impl Into<String>) -> Self {
        self.parts.push(part.into());
        self
    }

    /// Build final key (without tenant prefix)
    pub fn build(&self) -> String {
        self.parts.join(":")
    }

    /// Build final key with tenant prefix
    pub fn build_for_tenant(&self, tenant: &Tenant) -> String {
        tenant.cache_key(&self.build())
    }

    /// Build final key under the current tenant (or the default scope)
    pub fn build_for(&self, ctx: &TenantManager) -> String {
        scoped_key(ctx.tenant_id(), &self.build())
    }
}
