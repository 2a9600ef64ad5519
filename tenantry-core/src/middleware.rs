// Middleware system for request processing

use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

/// Continuation passed to a middleware; calling it runs the rest of the chain.
pub type Next = Box<
    dyn FnOnce(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        + Send,
>;

/// Type alias for handler functions
pub type HandlerFn = Arc<
    dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        + Send
        + Sync,
>;

/// Middleware trait for processing requests
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and optionally pass to next middleware
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Middleware chain executor
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Arc::new(Vec::new()),
        }
    }

    /// Add a middleware to the chain
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        let mut mws = (*self.middlewares).clone();
        mws.push(Arc::new(middleware));
        self.middlewares = Arc::new(mws);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the middleware chain with a handler
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, handler).await
    }

    fn execute_from(
        &self,
        index: usize,
        req: HttpRequest,
        handler: HandlerFn,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>> {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            handler(req)
        } else {
            let middleware = self.middlewares[index].clone();
            let chain = self.clone();

            trace!(middleware_index = index, "Executing middleware");
            Box::pin(async move {
                middleware
                    .handle(
                        req,
                        Box::new(move |req| chain.execute_from(index + 1, req, handler)),
                    )
                    .await
            })
        }
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HeaderStamp(&'static str);

    #[async_trait]
    impl Middleware for HeaderStamp {
        async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
            let req = req.with_header("x-stamp", self.0);
            next(req).await
        }
    }

    struct Reject;

    #[async_trait]
    impl Middleware for Reject {
        async fn handle(&self, _req: HttpRequest, _next: Next) -> Result<HttpResponse, Error> {
            Err(Error::Forbidden("rejected".to_string()))
        }
    }

    fn echo_stamp() -> HandlerFn {
        Arc::new(|req: HttpRequest| {
            Box::pin(async move {
                let stamp = req.header("x-stamp").unwrap_or("none").to_string();
                Ok(HttpResponse::ok().with_body(stamp.into_bytes()))
            })
        })
    }

    #[test]
    fn test_chain_runs_in_order() {
        let mut chain = MiddlewareChain::new();
        chain.use_middleware(HeaderStamp("first"));
        chain.use_middleware(HeaderStamp("second"));
        assert_eq!(chain.len(), 2);

        let response = tokio_test::block_on(chain.apply(HttpRequest::new("GET", "/"), echo_stamp()))
            .unwrap();
        assert_eq!(response.body, b"second".to_vec());
    }

    #[tokio::test]
    async fn test_chain_short_circuits() {
        let mut chain = MiddlewareChain::new();
        chain.use_middleware(Reject);
        chain.use_middleware(HeaderStamp("never"));

        let result = chain.apply(HttpRequest::new("GET", "/"), echo_stamp()).await;
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_empty_chain_calls_handler() {
        let chain = MiddlewareChain::default();
        assert!(chain.is_empty());

        let response = chain
            .apply(HttpRequest::new("GET", "/"), echo_stamp())
            .await
            .unwrap();
        assert_eq!(response.body, b"none".to_vec());
    }
}
