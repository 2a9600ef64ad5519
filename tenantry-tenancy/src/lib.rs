//! Multi-Tenancy for Tenantry
//!
//! Works out which tenant a request belongs to, then scopes cache,
//! configuration, queue, routing, model and database access to that tenant.
//!
//! # Features
//!
//! - 🔍 **Tenant Resolution** - Domain, subdomain, parameter, header and custom strategies
//! - 🏢 **Request Context** - One [`TenantManager`] per request, no shared "current tenant"
//! - 💾 **Tenant-Aware Caching** - Keys prefixed `tenant:{id}:` with lazy TTL expiry
//! - 🎛️ **Tenant Configuration** - Per-tenant overrides over a base config
//! - 📨 **Tenant Queues** - Prefixed queue names and routing keys, tenant-stamped messages
//! - 🧩 **Model Overrides** - Per-tenant model factories
//! - 🛣️ **Tenant Routes** - Private per-tenant routes shadowing shared ones
//! - 🗄️ **Database Per Tenant** - Lazily opened, cached connections
//! - 🚀 **Auto Middleware** - Resolution and inactive-tenant rejection at the request boundary
//!
//! # Quick Start
//!
//! ## 1. Load Tenants
//!
//! ```rust,ignore
//! use tenantry_tenancy::*;
//!
//! let repository = TenantRepository::new(Arc::new(MyTenantStore::new(db_pool)));
//! let resolver = Arc::new(TenantResolver::with_settings(TenancySettings::from_env()?));
//! let service = TenantService::load(repository, resolver.clone()).await?;
//! ```
//!
//! ## 2. Resolve Per Request
//!
//! ```rust,ignore
//! chain.use_middleware(TenantMiddleware::new(resolver.clone()));
//!
//! // In a handler
//! let ctx = tenant_manager(&req).expect("TenantMiddleware installed");
//! ```
//!
//! ## 3. Scoped Services
//!
//! ```rust,ignore
//! let cache = TenantCache::new(InMemoryCacheStore::new());
//!
//! // Stored under "tenant:{id}:users:1"
//! cache.set(ctx, "users:1", json!({"name": "Alice"}), None).await?;
//!
//! let host = config.get(ctx, "mail.host");
//! queue.publish(ctx, "orders", EventMessage::new("order.created", payload), QueueOptions::new()).await?;
//! let conn = databases.get_connection(ctx).await?;
//! ```
//!
//! ## 4. Background Work
//!
//! ```rust,ignore
//! let mut ctx = service.tenant_manager();
//! if let Some(id) = message_tenant_id(&message) {
//!     ctx.set_tenant_by_id(id)?;
//! }
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod manager;
pub mod middleware;
pub mod model;
pub mod queue;
pub mod repository;
pub mod resolver;
pub mod routing;
pub mod service;
pub mod settings;
pub mod tenant;

pub use cache::{CacheError, CacheKeyBuilder, CacheStore, InMemoryCacheStore, TenantCache};
pub use config::{ConfigSource, MapConfig, TenantConfig};
pub use database::{ConnectionFactory, DatabaseConfig, TenantDatabaseResolver};
pub use error::TenantError;
pub use manager::TenantManager;
pub use middleware::{TenantMiddleware, get_tenant_id, tenant_manager};
pub use model::{ModelFactory, TenantModelResolver};
pub use queue::{
    EventMessage, MessageHandler, QueueAdapter, QueueError, QueueOptions, TENANT_ID_METADATA_KEY,
    TenantQueue, message_tenant_id,
};
pub use repository::{InMemoryTenantStore, TenantRecord, TenantRepository, TenantStore};
pub use resolver::{ResolverStrategy, TenantResolver};
pub use routing::TenantRouter;
pub use service::TenantService;
pub use settings::TenancySettings;
pub use tenant::{DEFAULT_SCOPE, Tenant};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheStore, InMemoryCacheStore, TenantCache};
    pub use crate::config::{ConfigSource, MapConfig, TenantConfig};
    pub use crate::database::{ConnectionFactory, DatabaseConfig, TenantDatabaseResolver};
    pub use crate::error::TenantError;
    pub use crate::manager::TenantManager;
    pub use crate::middleware::{TenantMiddleware, tenant_manager};
    pub use crate::model::TenantModelResolver;
    pub use crate::queue::{EventMessage, QueueAdapter, TenantQueue};
    pub use crate::repository::{TenantRepository, TenantStore};
    pub use crate::resolver::{ResolverStrategy, TenantResolver};
    pub use crate::routing::TenantRouter;
    pub use crate::service::TenantService;
    pub use crate::settings::TenancySettings;
    pub use crate::tenant::Tenant;
}
