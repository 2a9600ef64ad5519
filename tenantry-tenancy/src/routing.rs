//! Tenant-Aware Routing
//!
//! One base route table shared by every tenant plus a private table per
//! tenant, created on the tenant's first route. A tenant's private table is
//! consulted first, so its routes shadow base routes with the same pattern.

use crate::manager::TenantManager;
use dashmap::DashMap;
use parking_lot::RwLock;
use tenantry_core::{Dispatch, Error, HandlerFn, HttpRequest, HttpResponse, RouteTable, Router};
use tracing::debug;

/// Base router plus lazily created per-tenant routers
pub struct TenantRouter<R: RouteTable + Default = Router> {
    base: RwLock<R>,
    tenants: DashMap<String, R>,
}

impl<R: RouteTable + Default> TenantRouter<R> {
    pub fn new() -> Self {
        Self::with_base(R::default())
    }

    /// Wrap an existing base route table
    pub fn with_base(base: R) -> Self {
        Self {
            base: RwLock::new(base),
            tenants: DashMap::new(),
        }
    }

    /// Add a route for one tenant, or for every tenant when `tenant_id` is `None`
    pub fn add_tenant_route(
        &self,
        tenant_id: Option<&str>,
        method: &str,
        pattern: &str,
        handler: HandlerFn,
    ) {
        match tenant_id {
            None => self.base.write().add_route(method, pattern, handler),
            Some(tenant_id) => {
                debug!(tenant_id, method, pattern, "Adding tenant route");
                self.tenants
                    .entry(tenant_id.to_string())
                    .or_default()
                    .add_route(method, pattern, handler);
            }
        }
    }

    /// Shorthand for a route every tenant sees
    pub fn add_route(&self, method: &str, pattern: &str, handler: HandlerFn) {
        self.add_tenant_route(None, method, pattern, handler);
    }

    /// Match against the current tenant's router, then the base router.
    ///
    /// Any tenant result other than `Found` falls through to the base router.
    pub fn dispatch(&self, ctx: &TenantManager, method: &str, uri: &str) -> Dispatch {
        if let Some(tenant_id) = ctx.tenant_id()
            && let Some(router) = self.tenants.get(tenant_id)
        {
            let result = router.dispatch(method, uri);
            if result.is_found() {
                return result;
            }
        }

        self.base.read().dispatch(method, uri)
    }

    /// Dispatch and invoke the matched handler with its path parameters
    pub async fn route(
        &self,
        ctx: &TenantManager,
        mut request: HttpRequest,
    ) -> Result<HttpResponse, Error> {
        match self.dispatch(ctx, &request.method, &request.path) {
            Dispatch::Found { handler, params } => {
                request.path_params = params;
                handler(request).await
            }
            Dispatch::MethodNotAllowed { allowed } => Err(Error::MethodNotAllowed(format!(
                "{} {} (allowed: {})",
                request.method,
                request.path,
                allowed.join(", ")
            ))),
            Dispatch::NotFound => Err(Error::RouteNotFound(format!(
                "{} {}",
                request.method, request.path
            ))),
        }
    }

    pub fn has_tenant_router(&self, tenant_id: &str) -> bool {
        self.tenants.contains_key(tenant_id)
    }
}

impl<R: RouteTable + Default> Default for TenantRouter<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RouteTable + Default> std::fmt::Debug for TenantRouter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tenants: Vec<String> = self.tenants.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("TenantRouter")
            .field("tenant_routers", &tenants)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TenantResolver;
    use crate::tenant::Tenant;
    use std::sync::Arc;

    fn text(body: &'static str) -> HandlerFn {
        Arc::new(move |_req: HttpRequest| {
            Box::pin(async move { Ok(HttpResponse::ok().with_body(body.as_bytes().to_vec())) })
        })
    }

    fn ctx(tenant: Option<&str>) -> TenantManager {
        let mut manager = TenantManager::new(Arc::new(TenantResolver::new()));
        manager.set_tenant(tenant.map(|id| Arc::new(Tenant::new(id, id))));
        manager
    }

    #[tokio::test]
    async fn test_tenant_route_shadows_base() {
        let router: TenantRouter = TenantRouter::new();
        router.add_route("GET", "/home", text("base"));
        router.add_tenant_route(Some("acme"), "GET", "/home", text("acme"));

        let acme = router
            .route(&ctx(Some("acme")), HttpRequest::new("GET", "/home"))
            .await
            .unwrap();
        assert_eq!(acme.body, b"acme".to_vec());

        let other = router
            .route(&ctx(Some("other")), HttpRequest::new("GET", "/home"))
            .await
            .unwrap();
        assert_eq!(other.body, b"base".to_vec());
    }

    #[test]
    fn test_private_route_invisible_to_other_tenants() {
        let router: TenantRouter = TenantRouter::new();
        router.add_tenant_route(Some("acme"), "GET", "/x", text("x"));

        assert!(router.dispatch(&ctx(Some("acme")), "GET", "/x").is_found());
        assert!(matches!(
            router.dispatch(&ctx(Some("other")), "GET", "/x"),
            Dispatch::NotFound
        ));
        assert!(matches!(router.dispatch(&ctx(None), "GET", "/x"), Dispatch::NotFound));
    }

    #[test]
    fn test_fallback_on_method_mismatch() {
        let router: TenantRouter = TenantRouter::new();
        router.add_tenant_route(Some("acme"), "POST", "/items", text("create"));
        router.add_route("GET", "/items", text("list"));

        // Tenant router says MethodNotAllowed; base router has the GET
        assert!(router.dispatch(&ctx(Some("acme")), "GET", "/items").is_found());
    }

    #[tokio::test]
    async fn test_route_errors() {
        let router: TenantRouter = TenantRouter::new();
        router.add_route("GET", "/items/:id", text("item"));

        let err = router
            .route(&ctx(None), HttpRequest::new("DELETE", "/items/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed(_)));

        let err = router
            .route(&ctx(None), HttpRequest::new("GET", "/nothing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RouteNotFound(_)));
    }

    #[tokio::test]
    async fn test_path_params_reach_handler() {
        let router: TenantRouter = TenantRouter::new();
        let echo: HandlerFn = Arc::new(|req: HttpRequest| {
            Box::pin(async move {
                let id = req.param("id").unwrap_or_default().to_string();
                Ok(HttpResponse::ok().with_body(id.into_bytes()))
            })
        });
        router.add_tenant_route(Some("acme"), "GET", "/users/:id", echo);

        let response = router
            .route(&ctx(Some("acme")), HttpRequest::new("GET", "/users/42?x=1"))
            .await
            .unwrap();
        assert_eq!(response.body, b"42".to_vec());
    }

    #[test]
    fn test_router_created_lazily() {
        let router: TenantRouter = TenantRouter::new();
        router.add_route("GET", "/", text("root"));
        assert!(!router.has_tenant_router("acme"));

        router.add_tenant_route(Some("acme"), "GET", "/a", text("a"));
        router.add_tenant_route(Some("acme"), "GET", "/b", text("b"));
        assert!(router.has_tenant_router("acme"));
        assert!(router.dispatch(&ctx(Some("acme")), "GET", "/a").is_found());
        assert!(router.dispatch(&ctx(Some("acme")), "GET", "/b").is_found());
    }
}
