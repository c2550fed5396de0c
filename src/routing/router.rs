//! Route table and lookup.
//!
//! # Responsibilities
//! - Store named routes (method, pattern, action, route middleware)
//! - Resolve a method and path to the most specific matching route
//! - Build paths for named routes
//!
//! # Design Decisions
//! - Built once at startup, immutable while serving
//! - O(n) scan over routes (acceptable for typical route counts)
//! - Explicit `None` on no match; the pipeline decides what that means
//! - Equal specificity keeps the earliest registered route

use std::fmt;

use axum::http::Method;

use super::matcher::Pattern;
use crate::middleware::route::{self, Action, RouteMiddleware};

/// A route with a name, a method, a path pattern and its action.
#[derive(Clone)]
pub struct NamedRoute {
    name: String,
    method: Method,
    pattern: Pattern,
    action: Action,
    middleware: Vec<RouteMiddleware>,
}

impl NamedRoute {
    pub fn new(name: impl Into<String>, method: Method, pattern: &str, action: Action) -> Self {
        Self {
            name: name.into(),
            method,
            pattern: Pattern::parse(pattern),
            action,
            middleware: Vec::new(),
        }
    }

    /// Attach route middleware; the first attached runs outermost.
    pub fn with_middleware(mut self, layer: RouteMiddleware) -> Self {
        self.middleware.push(layer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The action wrapped in this route's middleware.
    pub fn handler(&self) -> Action {
        route::compose(&self.middleware, self.action.clone())
    }
}

impl fmt::Debug for NamedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedRoute")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a NamedRoute,
    /// Path variables in pattern order, raw (not percent-decoded).
    pub bindings: Vec<(String, String)>,
}

/// Immutable route table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<NamedRoute>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route (builder form).
    pub fn route(mut self, route: NamedRoute) -> Self {
        self.add(route);
        self
    }

    pub fn add(&mut self, route: NamedRoute) {
        tracing::debug!(
            name = %route.name,
            method = %route.method,
            pattern = %route.pattern,
            "Registered route"
        );
        self.routes.push(route);
    }

    pub fn routes(&self) -> &[NamedRoute] {
        &self.routes
    }

    /// Find the most specific route for `method` and `path`. A HEAD request
    /// with no HEAD route of its own resolves against the GET routes.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.resolve_exact(method, path).or_else(|| {
            if *method == Method::HEAD {
                self.resolve_exact(&Method::GET, path)
            } else {
                None
            }
        })
    }

    fn resolve_exact(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let mut best: Option<RouteMatch<'_>> = None;

        for route in self.routes.iter().filter(|r| r.method == *method) {
            let Some(bindings) = route.pattern.matches(path) else {
                continue;
            };
            let replace = match &best {
                Some(current) => route.pattern.specificity() > current.route.pattern.specificity(),
                None => true,
            };
            if replace {
                best = Some(RouteMatch { route, bindings });
            }
        }

        best
    }

    /// Path for the route called `name`, or `None` if there is no such
    /// route or a variable is missing from `params`.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        self.routes
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.pattern.render(params))
    }
}
