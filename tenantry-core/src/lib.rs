//! Request-handling primitives for Tenantry
//!
//! The tenancy layer consumes HTTP through a deliberately narrow surface:
//! a request with headers, query, form and attribute parameters; typed
//! request extensions; an async middleware chain; and a route table that
//! can be dispatched by method and URI.

pub mod error;
pub mod extensions;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod routing;

pub use error::Error;
pub use extensions::Extensions;
pub use http::{HttpRequest, HttpResponse};
pub use middleware::{HandlerFn, Middleware, MiddlewareChain, Next};
pub use routing::{Dispatch, Route, RouteTable, Router};
