// Routing system for HTTP requests

use crate::{Error, HandlerFn, HttpRequest, HttpResponse};
use std::collections::HashMap;

/// Outcome of matching a method and URI against a route table
#[derive(Clone)]
pub enum Dispatch {
    Found {
        handler: HandlerFn,
        params: HashMap<String, String>,
    },
    NotFound,
    /// The path exists but not for this method
    MethodNotAllowed { allowed: Vec<String> },
}

impl Dispatch {
    pub fn is_found(&self) -> bool {
        matches!(self, Dispatch::Found { .. })
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::Found { params, .. } => {
                f.debug_struct("Found").field("params", params).finish()
            }
            Dispatch::NotFound => f.write_str("NotFound"),
            Dispatch::MethodNotAllowed { allowed } => f
                .debug_struct("MethodNotAllowed")
                .field("allowed", allowed)
                .finish(),
        }
    }
}

/// A table of routes that can be extended and dispatched against.
pub trait RouteTable: Send + Sync {
    fn add_route(&mut self, method: &str, pattern: &str, handler: HandlerFn);

    fn dispatch(&self, method: &str, uri: &str) -> Dispatch;
}

/// Route definition with handler
#[derive(Clone)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub handler: HandlerFn,
}

/// Router matching `/users/:id` style patterns segment by segment
#[derive(Clone, Default)]
pub struct Router {
    pub routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Dispatch a request and invoke the matched handler
    pub async fn route(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        match self.dispatch(&request.method, &request.path) {
            Dispatch::Found { handler, params } => {
                request.path_params = params;
                handler(request).await
            }
            Dispatch::MethodNotAllowed { .. } => Err(Error::MethodNotAllowed(format!(
                "{} {}",
                request.method, request.path
            ))),
            Dispatch::NotFound => Err(Error::RouteNotFound(format!(
                "{} {}",
                request.method, request.path
            ))),
        }
    }
}

impl RouteTable for Router {
    fn add_route(&mut self, method: &str, pattern: &str, handler: HandlerFn) {
        self.routes.push(Route {
            method: method.to_ascii_uppercase(),
            path: pattern.to_string(),
            handler,
        });
    }

    fn dispatch(&self, method: &str, uri: &str) -> Dispatch {
        let path = uri.split_once('?').map_or(uri, |(p, _)| p);
        let mut allowed = Vec::new();

        for route in &self.routes {
            let Some(params) = match_path(&route.path, path) else {
                continue;
            };

            if route.method.eq_ignore_ascii_case(method) {
                return Dispatch::Found {
                    handler: route.handler.clone(),
                    params,
                };
            }

            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            Dispatch::NotFound
        } else {
            Dispatch::MethodNotAllowed { allowed }
        }
    }
}

/// Match a route path pattern against a request path
/// Returns Some(params) if matched, None otherwise
fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        let param_name = pattern_part.strip_prefix(':').or_else(|| {
            pattern_part
                .strip_prefix('{')
                .and_then(|p| p.strip_suffix('}'))
        });

        match param_name {
            Some(name) => {
                params.insert(name.to_string(), path_part.to_string());
            }
            None if pattern_part != path_part => return None,
            None => {}
        }
    }

    Some(params)
}
