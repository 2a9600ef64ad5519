// Tenantry - multi-tenant request isolation
//
// Resolves the tenant behind each request and scopes cache, configuration,
// queue, routing, model and database access to it.

// Re-export request-handling primitives
pub use tenantry_core::{
    Dispatch, Error, Extensions, HandlerFn, HttpRequest, HttpResponse, Middleware,
    MiddlewareChain, Next, Route, RouteTable, Router, logging,
};

// Re-export the tenancy layer
pub use tenantry_tenancy::{
    CacheError, CacheKeyBuilder, CacheStore, ConfigSource, ConnectionFactory, DEFAULT_SCOPE,
    DatabaseConfig, EventMessage, InMemoryCacheStore, InMemoryTenantStore, MapConfig,
    MessageHandler, ModelFactory, QueueAdapter, QueueError, QueueOptions, ResolverStrategy,
    TENANT_ID_METADATA_KEY, TenancySettings, Tenant, TenantCache, TenantConfig,
    TenantDatabaseResolver, TenantError, TenantManager, TenantMiddleware, TenantModelResolver,
    TenantQueue, TenantRecord, TenantRepository, TenantResolver, TenantRouter, TenantService,
    TenantStore, get_tenant_id, message_tenant_id, tenant_manager,
};

/// Prelude for common imports.
///
/// ```
/// use tenantry::prelude::*;
/// ```
pub mod prelude {
    pub use tenantry_core::{
        Error, HandlerFn, HttpRequest, HttpResponse, Middleware, MiddlewareChain, Next, Router,
    };
    pub use tenantry_tenancy::prelude::*;

    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
}
